use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "kandox", version, about = "Console for the Kandox contest and scoring backend")]
pub struct Args {
    /// Route the console is acting from. A failed credential refresh ends
    /// the session only under the protected prefix.
    #[arg(long, global = true, default_value = "/admin")]
    pub route: String,

    /// Backend origin, overriding the config file
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and store the access token
    Login {
        #[arg(short, long, env = "KANDOX_USERNAME")]
        username: Option<String>,
        #[arg(long, env = "KANDOX_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sign out and forget the stored token
    Logout,

    /// Show the signed-in account
    Whoami,

    /// Send an arbitrary request and print the response envelope
    Request {
        /// HTTP method (GET, POST, PUT, PATCH, DELETE)
        method: String,
        /// Path under the backend origin, e.g. /api/v1/roles
        path: String,
        /// JSON request body
        #[arg(short, long)]
        data: Option<String>,
        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "query")]
        query: Vec<String>,
    },

    /// Shorthand for `request GET <PATH>`
    Get {
        path: String,
        #[arg(short, long = "query")]
        query: Vec<String>,
    },

    /// Save a file endpoint's raw bytes
    Download {
        path: String,
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Check whether the signed-in account holds a permission
    Can {
        module: String,
        method: Option<String>,
        path: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_with_body_and_query() {
        let args = Args::try_parse_from([
            "kandox",
            "request",
            "post",
            "/api/v1/changs",
            "--data",
            r#"{"name":"Q1"}"#,
            "-q",
            "page=1",
            "--route",
            "/admin/changs",
        ])
        .expect("valid args");
        assert_eq!(args.route, "/admin/changs");
        match args.command {
            Commands::Request { method, path, data, query } => {
                assert_eq!(method, "post");
                assert_eq!(path, "/api/v1/changs");
                assert_eq!(data.as_deref(), Some(r#"{"name":"Q1"}"#));
                assert_eq!(query, vec!["page=1".to_string()]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_can_optional_arguments() {
        let args = Args::try_parse_from(["kandox", "can", "ROLES"]).expect("valid args");
        assert_eq!(args.route, "/admin");
        assert!(matches!(
            args.command,
            Commands::Can { ref module, method: None, path: None } if module == "ROLES"
        ));
    }

    #[test]
    fn test_download_requires_output() {
        assert!(Args::try_parse_from(["kandox", "download", "/api/v1/files/a.xlsx"]).is_err());
    }
}
