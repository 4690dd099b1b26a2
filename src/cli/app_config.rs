use clap::{ArgAction, Parser};
use std::path::PathBuf;

const ENVIRONMENT: &str = "\
ENVIRONMENT:
  HTTP_PROXY    proxy for HTTP requests; complete URL or HOST[:PORT]
                used for HTTPS requests if HTTPS_PROXY undefined
  HTTPS_PROXY   proxy for HTTPS requests; complete URL or HOST[:PORT]
  NO_PROXY      comma-separated list of hosts to exclude from proxy";

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Visualise the timing of every phase of an HTTP request",
    long_about = None,
    after_help = ENVIRONMENT
)]
pub struct Cli {
    /// The request url, like https://www.example.com or example.com:80
    pub url: String,
    /// HTTP method to use
    #[arg(short = 'X', long = "request", value_name = "method", default_value = "GET")]
    pub method: String,
    /// The request body, or @file to send the contents of a file
    #[arg(short = 'd', long = "data", value_name = "data")]
    pub body: Option<String>,
    /// Follow 30x redirects
    #[arg(short = 'L', long = "location")]
    pub follow_redirects: bool,
    /// Don't read the body of the request, send HEAD
    #[arg(short = 'I', long = "head")]
    pub only_header: bool,
    /// Allow insecure SSL connections
    #[arg(short = 'k', long = "insecure")]
    pub insecure: bool,
    /// Set HTTP header; repeatable: -H 'Accept: ...' -H 'Range: ...'
    #[arg(short = 'H', long = "header", value_name = "header")]
    pub headers: Vec<String>,
    /// Save body as remote filename
    #[arg(short = 'O', long = "remote-name")]
    pub save_output: bool,
    /// Output file for body, ignored with -O
    #[arg(short = 'o', long = "output", value_name = "file")]
    pub output: Option<PathBuf>,
    /// Client cert file for TLS, holding the certificate chain and private key
    #[arg(short = 'E', long = "cert", value_name = "file")]
    pub client_cert: Option<PathBuf>,
    /// Resolve IPv4 addresses only
    #[arg(short = '4', long = "ipv4", conflicts_with = "ipv6")]
    pub ipv4: bool,
    /// Resolve IPv6 addresses only
    #[arg(short = '6', long = "ipv6")]
    pub ipv6: bool,
    /// Request timeout in seconds, covering the whole exchange; 0 disables it
    #[arg(short = 'm', long = "max-time", value_name = "seconds", default_value_t = 10)]
    pub timeout: u64,
    /// Make the operation more talkative, repeat for more
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbosity: u8,
    /// Print one JSON object per visit instead of the diagram
    #[arg(long = "json")]
    pub json: bool,
}
