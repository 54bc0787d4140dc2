//! Install plans and the confirmation shown before running them.
//!
//! Inference produces a [`CommandPlan`] (what will run) and a
//! [`Confirmation`] (what it will do to the system). Neither has side
//! effects; the executor consumes the plan afterwards.

use owo_colors::OwoColorize;
use std::collections::BTreeSet;
use std::fmt;

use crate::cl;

/// Name of the stream archive written by the builder.
pub const STREAM_ARCHIVE: &str = "files.tar";

/// Name of the bootstrap program artifact.
pub const BOOTSTRAP_ARTIFACT: &str = "qinstapp.pgm";

/// Scripts run around the command plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Hook {
    PreInstall,
    PostInstall,
}

impl Hook {
    /// Artifact name the hook is packaged under.
    pub fn file_name(self) -> &'static str {
        match self {
            Hook::PreInstall => ".preinstall",
            Hook::PostInstall => ".postinstall",
        }
    }

    /// Label used when echoing hook output.
    pub fn label(self) -> &'static str {
        match self {
            Hook::PreInstall => "PREINSTALL",
            Hook::PostInstall => "POSTINSTALL",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// What an artifact is, judged by its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactKind {
    StreamArchive,
    LibrarySave { library: String },
    Bootstrap,
    Hook(Hook),
    Other,
}

impl ArtifactKind {
    pub fn classify(name: &str) -> Self {
        if name == BOOTSTRAP_ARTIFACT {
            ArtifactKind::Bootstrap
        } else if name == Hook::PreInstall.file_name() {
            ArtifactKind::Hook(Hook::PreInstall)
        } else if name == Hook::PostInstall.file_name() {
            ArtifactKind::Hook(Hook::PostInstall)
        } else if name.ends_with(".tar") {
            ArtifactKind::StreamArchive
        } else if let Some(library) = name.strip_suffix(".lib") {
            ArtifactKind::LibrarySave {
                library: library.trim().to_string(),
            }
        } else {
            ArtifactKind::Other
        }
    }
}

/// Ordered commands plus the hooks packaged alongside them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandPlan {
    pub commands: Vec<String>,
    pub hooks: BTreeSet<Hook>,
}

impl CommandPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: impl Into<String>) {
        self.commands.push(command.into());
    }

    pub fn has_hook(&self, hook: Hook) -> bool {
        self.hooks.contains(&hook)
    }
}

/// A verb describing an impact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Install,
    Replace,
    Run,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Install => "Install",
            Verb::Replace => "Replace",
            Verb::Run => "Run",
        }
    }

    pub fn colored(&self) -> String {
        match self {
            Verb::Install => self.as_str().green().to_string(),
            Verb::Replace => self.as_str().red().to_string(),
            Verb::Run => self.as_str().yellow().to_string(),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One effect the install will have on the system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Impact {
    /// Stream files unpacked over `/`, as listed from the archive.
    StreamFiles { entries: Vec<String> },
    /// An existing library is deleted and restored from the bundle.
    LibraryReplaced { library: String },
    /// A library that does not exist yet is restored.
    LibraryInstalled { library: String },
    /// The bootstrap program is loaded and run.
    LoadAndRun,
}

impl Impact {
    pub fn verb(&self) -> Verb {
        match self {
            Impact::StreamFiles { .. } | Impact::LibraryInstalled { .. } => Verb::Install,
            Impact::LibraryReplaced { .. } => Verb::Replace,
            Impact::LoadAndRun => Verb::Run,
        }
    }

    /// Whether the impact destroys existing data.
    pub fn is_destructive(&self) -> bool {
        matches!(self, Impact::LibraryReplaced { .. })
    }
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Impact::StreamFiles { entries } => {
                write!(f, "{} the following stream files:", self.verb().colored())?;
                for entry in entries {
                    write!(f, "\n      {}", entry.dimmed())?;
                }
                Ok(())
            }
            Impact::LibraryReplaced { library } => write!(
                f,
                "{} library {} ({})",
                self.verb().colored(),
                library.bold(),
                "will be deleted from the system and replaced".red()
            ),
            Impact::LibraryInstalled { library } => write!(
                f,
                "{} library {} on the system",
                self.verb().colored(),
                library.bold()
            ),
            Impact::LoadAndRun => write!(f, "{} {}", self.verb().colored(), cl::load_and_run()),
        }
    }
}

/// Everything the user is asked to agree to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Confirmation {
    pub impacts: Vec<Impact>,
}

impl Confirmation {
    pub fn add(&mut self, impact: Impact) {
        self.impacts.push(impact);
    }

    pub fn is_destructive(&self) -> bool {
        self.impacts.iter().any(Impact::is_destructive)
    }

    pub fn is_empty(&self) -> bool {
        self.impacts.is_empty()
    }
}

impl fmt::Display for Confirmation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}",
            "If you continue, the following actions will be taken on your system:".bold()
        )?;
        if self.impacts.is_empty() {
            writeln!(f, "  {}", "No changes".dimmed())?;
        }
        for impact in &self.impacts {
            writeln!(f, "  ▸ {impact}")?;
        }
        Ok(())
    }
}
