//! CLI command and subcommand definitions

use clap::{ArgAction, Parser, Subcommand};
use slipstream_core::{ModuleKind, NodeParameter};
use std::path::PathBuf;
use uuid::Uuid;

/// SlipStream command line tool
#[derive(Parser, Debug)]
#[command(name = "slipstream")]
#[command(version, about = "SlipStream command line tool", long_about = None)]
pub struct Cli {
    /// The section to use from the config file instead of the default
    #[arg(short = 'P', long, global = true, value_name = "PROFILE")]
    pub profile: Option<String>,

    /// The config file to use instead of the default (~/.slipstreamconfig)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Username used to log in
    #[arg(short, long, global = true)]
    pub username: Option<String>,

    /// Password used to log in
    #[arg(short, long, global = true)]
    pub password: Option<String>,

    /// SlipStream endpoint (overrides config file)
    #[arg(short, long, global = true, env = "SLIPSTREAM_ENDPOINT", value_name = "URL")]
    pub endpoint: Option<String>,

    /// Increase logging verbosity (repeatable)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Decrease logging verbosity (repeatable)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub quiet: u8,

    /// Skip TLS certificate verification
    #[arg(short, long, global = true)]
    pub insecure: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty table output
    Table,
    /// JSON output
    Json,
}

impl From<OutputFormat> for crate::format::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Table => crate::format::OutputFormat::Table,
            OutputFormat::Json => crate::format::OutputFormat::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in with your SlipStream credentials
    Login,

    /// Clear local authentication credentials
    Logout,

    /// List currently defined aliases
    Aliases,

    /// List resources: applications, modules, runs, virtual machines
    List {
        #[command(subcommand)]
        command: ListCommands,
    },

    /// Run modules: image, deployment
    Run {
        #[command(subcommand)]
        command: RunCommands,
    },

    /// Build the given image
    Build {
        /// Image path
        path: String,

        /// The cloud service to build the image with
        #[arg(long)]
        cloud: Option<String>,

        /// Open the created run in a web browser
        #[arg(long)]
        open: bool,
    },

    /// Terminate the given run
    Terminate {
        /// Run UUID
        #[arg(value_name = "UUID")]
        run_id: Uuid,
    },

    /// List current usage and quota by cloud service
    Usage,

    /// Publish a module to the store
    Publish {
        /// Module path
        path: String,

        /// Module version (defaults to the current one)
        version: Option<u64>,
    },

    /// Remove a module from the store
    Unpublish {
        /// Module path
        path: String,

        /// Module version (defaults to the current one)
        version: Option<u64>,
    },

    /// Delete a module, or a single version of it
    Delete {
        /// Module path
        path: String,

        /// Module version (all versions when omitted)
        version: Option<u64>,
    },

    /// Open the given run in a web browser
    Open {
        /// Run UUID
        #[arg(value_name = "UUID")]
        run_id: Uuid,
    },

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completion for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },

    /// Alias from the configuration, expanded before dispatch
    #[command(external_subcommand)]
    External(Vec<String>),
}

impl Commands {
    /// Whether the command talks to the server on behalf of a logged-in user.
    pub fn needs_session(&self) -> bool {
        !matches!(
            self,
            Commands::Login
                | Commands::Logout
                | Commands::Aliases
                | Commands::Open { .. }
                | Commands::Completion { .. }
                | Commands::External(_)
        )
    }
}

#[derive(Subcommand, Debug)]
pub enum ListCommands {
    /// List available applications
    Applications,

    /// List modules below a path
    Modules {
        /// Module path (the root when omitted)
        path: Option<String>,

        /// Descend into projects
        #[arg(short, long)]
        recurse: bool,

        /// Only show modules of this kind (component, application, project)
        #[arg(short, long)]
        kind: Option<ModuleKind>,
    },

    /// List runs
    Runs {
        /// Include inactive runs
        #[arg(long)]
        inactive: bool,
    },

    /// List virtual machines filtered according to given options
    #[command(name = "virtualmachines", alias = "vms")]
    VirtualMachines {
        /// The run UUID to filter with
        #[arg(long = "run", value_name = "UUID")]
        run_id: Option<Uuid>,

        /// The cloud service name to filter with
        #[arg(long)]
        cloud: Option<String>,

        /// The status to filter with
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
pub enum RunCommands {
    /// Run the image on the given cloud
    Image {
        /// Image path
        path: String,

        /// The cloud service to run the image with
        #[arg(long)]
        cloud: Option<String>,

        /// Open the created run in a web browser
        #[arg(long)]
        open: bool,
    },

    /// Run a deployment
    Deployment {
        /// Deployment path
        path: String,

        /// Node parameters
        #[arg(value_name = "NODE:KEY=VALUE")]
        params: Vec<NodeParameter>,

        /// Open the created run in a web browser
        #[arg(long)]
        open: bool,
    },
}
