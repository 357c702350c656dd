use crate::config::AppConfig;
use crate::utils::error::Result;
use clap::{Parser, Subcommand};
use std::path::Path;

#[derive(Debug, Clone, Parser)]
#[command(name = "formbridge")]
#[command(about = "Translated, assisted filling of Canadian PR forms with English PDF export")]
pub struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, default_value = "formbridge.toml")]
    pub config: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run the web server
    Serve {
        /// Override server.bind
        #[arg(long)]
        bind: Option<String>,

        /// Override storage.data_dir
        #[arg(long)]
        data_dir: Option<String>,
    },
    /// Load and validate the configuration, then exit
    CheckConfig,
    /// Export a saved session to an English PDF
    Export {
        /// Session id
        #[arg(long)]
        session: String,

        /// Output file (.pdf or .zip)
        #[arg(short, long, default_value = "form.pdf")]
        output: String,
    },
}

impl Cli {
    /// Loads the config file when it exists, otherwise falls back to defaults,
    /// then applies command line overrides.
    pub fn load_config(&self) -> Result<AppConfig> {
        let mut config = if Path::new(&self.config).exists() {
            AppConfig::from_file(&self.config)?
        } else {
            tracing::debug!("Config file {} not found, using defaults", self.config);
            AppConfig::default()
        };

        if let Command::Serve { bind, data_dir } = &self.command {
            if let Some(bind) = bind {
                config.server.bind = bind.clone();
            }
            if let Some(data_dir) = data_dir {
                config.storage.data_dir = data_dir.clone();
            }
        }

        Ok(config)
    }
}
