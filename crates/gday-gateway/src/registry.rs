// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Service registry.
//!
//! Built once at startup and immutable afterwards. Each entry maps a path
//! prefix to a backend base URL and optionally names the command the
//! supervisor launches for it.

use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Command line used to launch a backend service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    /// Executable.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
}

impl EntryPoint {
    /// Entry point without arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Split a whitespace-separated command line. `None` when blank.
    pub fn parse(raw: &str) -> Option<Self> {
        let mut parts = raw.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl fmt::Display for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// One routed backend service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEntry {
    /// Service name, used in logs.
    pub name: String,
    /// Path prefix, e.g. `/notificaciones`.
    pub prefix: String,
    /// Backend base URL, e.g. `http://127.0.0.1:3004`.
    pub base_url: String,
    /// Command launched by the supervisor, if any.
    pub entry_point: Option<EntryPoint>,
    /// Forward the path without the prefix.
    pub strip_prefix: bool,
}

impl ServiceEntry {
    /// Entry with no entry point that forwards the full path.
    pub fn new(
        name: impl Into<String>,
        prefix: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            prefix: prefix.into(),
            base_url: base_url.into(),
            entry_point: None,
            strip_prefix: false,
        }
    }

    /// Set the entry point.
    pub fn with_entry_point(mut self, entry_point: EntryPoint) -> Self {
        self.entry_point = Some(entry_point);
        self
    }

    /// Forward the path without the prefix.
    pub fn stripping_prefix(mut self) -> Self {
        self.strip_prefix = true;
        self
    }

    /// Outbound URL for an inbound `path` and raw `query`.
    pub fn target_url(&self, path: &str, query: Option<&str>) -> String {
        let path = if self.strip_prefix {
            path.strip_prefix(self.prefix.as_str()).unwrap_or(path)
        } else {
            path
        };
        let path = if path.is_empty() { "/" } else { path };
        let base = self.base_url.trim_end_matches('/');
        match query {
            Some(query) if !query.is_empty() => format!("{}{}?{}", base, path, query),
            _ => format!("{}{}", base, path),
        }
    }
}

/// Registry errors.
#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    /// A prefix is not of the form `/segment`.
    #[error("Invalid prefix for {name}: {prefix:?}")]
    InvalidPrefix {
        /// Service name.
        name: String,
        /// Offending prefix.
        prefix: String,
    },
    /// Two entries share a prefix.
    #[error("Duplicate prefix: {0}")]
    DuplicatePrefix(String),
    /// A base URL is not http(s).
    #[error("Invalid base URL for {name}: {url:?}")]
    InvalidBaseUrl {
        /// Service name.
        name: String,
        /// Offending URL.
        url: String,
    },
}

/// Immutable set of routed services.
#[derive(Debug, Clone, Default)]
pub struct ServiceRegistry {
    entries: Vec<ServiceEntry>,
}

impl ServiceRegistry {
    /// Validate and build a registry.
    pub fn new(entries: Vec<ServiceEntry>) -> Result<Self, RegistryError> {
        let mut seen = std::collections::HashSet::new();
        for entry in &entries {
            let prefix = entry.prefix.as_str();
            let valid = prefix.len() > 1
                && prefix.starts_with('/')
                && !prefix.ends_with('/')
                && !prefix.contains(['{', '}', '*', '?']);
            if !valid {
                return Err(RegistryError::InvalidPrefix {
                    name: entry.name.clone(),
                    prefix: entry.prefix.clone(),
                });
            }
            if !(entry.base_url.starts_with("http://") || entry.base_url.starts_with("https://")) {
                return Err(RegistryError::InvalidBaseUrl {
                    name: entry.name.clone(),
                    url: entry.base_url.clone(),
                });
            }
            if !seen.insert(prefix) {
                return Err(RegistryError::DuplicatePrefix(entry.prefix.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// All entries, in registration order.
    pub fn entries(&self) -> &[ServiceEntry] {
        &self.entries
    }

    /// Entry by service name.
    pub fn get(&self, name: &str) -> Option<&ServiceEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Entries that have an entry point.
    pub fn launchable(&self) -> impl Iterator<Item = (&ServiceEntry, &EntryPoint)> {
        self.entries
            .iter()
            .filter_map(|e| e.entry_point.as_ref().map(|ep| (e, ep)))
    }
}

/// A known backend service and its defaults.
#[derive(Debug, Clone, Copy)]
pub struct KnownService {
    /// Service name.
    pub name: &'static str,
    /// Path prefix.
    pub prefix: &'static str,
    /// Variable overriding the base URL.
    pub url_var: &'static str,
    /// Variable overriding the entry point.
    pub cmd_var: &'static str,
    /// Port of the default base URL.
    pub default_port: u16,
    /// Binary built from this workspace, launched by default.
    pub binary: Option<&'static str>,
    /// Forward the path without the prefix.
    pub strip_prefix: bool,
}

/// The services fronted by the gateway.
pub const KNOWN_SERVICES: [KnownService; 7] = [
    KnownService {
        name: "usuarios",
        prefix: "/usuarios",
        url_var: "USUARIOS_SERVICE_URL",
        cmd_var: "USUARIOS_SERVICE_CMD",
        default_port: 3002,
        binary: None,
        strip_prefix: true,
    },
    KnownService {
        name: "actividades",
        prefix: "/actividades",
        url_var: "ACTIVIDADES_SERVICE_URL",
        cmd_var: "ACTIVIDADES_SERVICE_CMD",
        default_port: 3003,
        binary: None,
        strip_prefix: false,
    },
    KnownService {
        name: "subscripciones",
        prefix: "/subscripciones",
        url_var: "SUBSCRIPCIONES_SERVICE_URL",
        cmd_var: "SUBSCRIPCIONES_SERVICE_CMD",
        default_port: 3006,
        binary: None,
        strip_prefix: false,
    },
    KnownService {
        name: "reportes",
        prefix: "/reportes",
        url_var: "REPORTES_SERVICE_URL",
        cmd_var: "REPORTES_SERVICE_CMD",
        default_port: 3005,
        binary: Some("gday-reportes"),
        strip_prefix: false,
    },
    KnownService {
        name: "notificaciones",
        prefix: "/notificaciones",
        url_var: "NOTIFICACIONES_SERVICE_URL",
        cmd_var: "NOTIFICACIONES_SERVICE_CMD",
        default_port: 3004,
        binary: Some("gday-notificaciones"),
        strip_prefix: false,
    },
    KnownService {
        name: "clases",
        prefix: "/clases",
        url_var: "CLASES_SERVICE_URL",
        cmd_var: "CLASES_SERVICE_CMD",
        default_port: 3007,
        binary: None,
        strip_prefix: false,
    },
    KnownService {
        name: "horario_sueno",
        prefix: "/horario_sueno",
        url_var: "HORARIO_SUENO_SERVICE_URL",
        cmd_var: "HORARIO_SUENO_SERVICE_CMD",
        default_port: 3008,
        binary: Some("gday-horario-sueno"),
        strip_prefix: false,
    },
];

impl KnownService {
    /// Build the registry entry.
    ///
    /// The entry point comes from `cmd_var` when set (blank disables the
    /// launch); otherwise workspace binaries are looked up in `bin_dir`.
    pub fn entry(
        &self,
        lookup: &impl Fn(&str) -> Option<String>,
        bin_dir: Option<&Path>,
    ) -> ServiceEntry {
        let base_url = lookup(self.url_var)
            .unwrap_or_else(|| format!("http://127.0.0.1:{}", self.default_port));
        let entry_point = match lookup(self.cmd_var) {
            Some(raw) => EntryPoint::parse(&raw),
            None => self.binary.map(|binary| {
                let program = match bin_dir {
                    Some(dir) => dir.join(binary).to_string_lossy().into_owned(),
                    None => binary.to_string(),
                };
                EntryPoint::new(program)
            }),
        };
        ServiceEntry {
            name: self.name.to_string(),
            prefix: self.prefix.to_string(),
            base_url,
            entry_point,
            strip_prefix: self.strip_prefix,
        }
    }
}
