//! Command-line definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// AFIP/ARCA electronic invoicing and thermal receipts.
#[derive(Parser, Debug)]
#[command(name = "arca", author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "ARCA_CONFIG")]
    pub config: Option<String>,

    /// Debug logging for arca crates
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect or edit the configuration
    Config {
        /// Config action
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Check WSFEv1, openssl and the configuration
    Status,

    /// Obtain and cache a WSAA access ticket
    Login {
        /// Web service the ticket is for
        #[arg(long, default_value = "wsfe")]
        service: String,

        /// Request a new ticket even if a cached one is valid
        #[arg(long)]
        force: bool,
    },

    /// Last authorized voucher number
    Last {
        /// Voucher type code (1, 6, 11, ...)
        #[arg(long = "type", default_value_t = 6)]
        voucher_type: u16,
    },

    /// Authorize an invoice with the next number
    Authorize {
        /// Invoice JSON file
        file: PathBuf,

        /// Print the receipt once authorized
        #[arg(long)]
        print: bool,
    },

    /// Render an invoice receipt
    Receipt {
        /// Invoice JSON file
        file: PathBuf,

        /// Write the ESC/POS bytes here instead of the configured printer
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Fiscal QR verification URL for an authorized invoice
    Qr {
        /// Invoice JSON file
        file: PathBuf,
    },

    /// Print a shelf price label
    Label {
        /// Product name
        #[arg(long)]
        name: String,

        /// Price, e.g. 1500 or 1499.90
        #[arg(long)]
        price: String,

        /// Mark as special offer
        #[arg(long)]
        offer: bool,

        /// Savings shown on offers
        #[arg(long)]
        savings: Option<String>,

        /// Write the ESC/POS bytes here instead of the configured printer
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Print a printer test page
    TestPrint {
        /// Write the ESC/POS bytes here instead of the configured printer
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

/// `config` subcommands.
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the resolved config file path
    Path,

    /// Get a value by dotted key (e.g. `issuer.cuit`)
    Get {
        /// Dotted key
        key: String,
    },

    /// Set a value by dotted key in the config file
    Set {
        /// Dotted key
        key: String,
        /// New value; booleans and numbers are detected
        value: String,
    },

    /// Write a default config file
    Init {
        /// Target file instead of the default location
        #[arg(long)]
        file: Option<String>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the configuration as environment variables
    Export {
        /// Format as `--env KEY=value` for docker
        #[arg(long)]
        docker_env: bool,
    },

    /// Validate the configuration
    Check,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_last_defaults_to_invoice_b() {
        let cli = Cli::try_parse_from(["arca", "last"]).unwrap();
        let Command::Last { voucher_type } = cli.command else {
            unreachable!("Expected Last command");
        };
        assert_eq!(voucher_type, 6);
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["arca", "authorize", "venta.json", "--print", "-v", "-c", "x.toml"])
                .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config.as_deref(), Some("x.toml"));
        let Command::Authorize { file, print } = cli.command else {
            unreachable!("Expected Authorize command");
        };
        assert_eq!(file, PathBuf::from("venta.json"));
        assert!(print);
    }

    #[test]
    fn test_parse_config_set() {
        let cli = Cli::try_parse_from(["arca", "config", "set", "issuer.point_of_sale", "9"])
            .unwrap();
        let Command::Config {
            action: ConfigAction::Set { key, value },
        } = cli.command
        else {
            unreachable!("Expected config set");
        };
        assert_eq!(key, "issuer.point_of_sale");
        assert_eq!(value, "9");
    }

    #[test]
    fn test_parse_label() {
        let cli = Cli::try_parse_from([
            "arca", "label", "--name", "Yerba", "--price", "3500", "--offer", "--savings", "500",
        ])
        .unwrap();
        let Command::Label {
            name,
            price,
            offer,
            savings,
            out,
        } = cli.command
        else {
            unreachable!("Expected Label command");
        };
        assert_eq!(name, "Yerba");
        assert_eq!(price, "3500");
        assert!(offer);
        assert_eq!(savings.as_deref(), Some("500"));
        assert!(out.is_none());
    }

    #[test]
    fn test_subcommand_required() {
        assert!(Cli::try_parse_from(["arca"]).is_err());
    }
}
