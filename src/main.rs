//! unicache - command-line access to a file cache directory
//!
//! Reads and writes the same files a [`FileCache`] in an application would,
//! which makes it handy for inspecting or seeding a cache from the shell.

use anyhow::{bail, Context};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use unicache::{Cache, DriverOptions, FileCache};

/// What to do with the cache
#[derive(Debug, PartialEq)]
enum Command {
    Get(String),
    Has(String),
    Set(String, String),
    Del(Vec<String>),
    Clear,
}

/// CLI configuration
#[derive(Debug)]
struct Config {
    /// Cache directory
    dir: PathBuf,
    /// File name prefix
    prefix: String,
    /// Salt for file names
    secret: String,
    /// TTL for `set`
    ttl: Duration,
    /// Log every cache operation
    debug: bool,
    command: Command,
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args(args: &[String]) -> anyhow::Result<Self> {
        let mut dir = default_dir();
        let mut prefix = String::new();
        let mut secret = String::new();
        let mut ttl = Duration::ZERO;
        let mut debug = false;
        let mut positional = Vec::new();

        let mut i = 0;
        while i < args.len() {
            let value = |i: usize| {
                args.get(i + 1)
                    .cloned()
                    .with_context(|| format!("{} requires a value", args[i]))
            };

            match args[i].as_str() {
                "--dir" | "-d" => {
                    let raw = value(i)?;
                    if raw.is_empty() {
                        bail!("--dir must not be empty");
                    }
                    dir = PathBuf::from(raw);
                    i += 2;
                }
                "--prefix" => {
                    prefix = value(i)?;
                    i += 2;
                }
                "--secret" => {
                    secret = value(i)?;
                    i += 2;
                }
                "--ttl" | "-t" => {
                    let secs: u64 = value(i)?
                        .parse()
                        .context("--ttl expects a number of seconds")?;
                    ttl = Duration::from_secs(secs);
                    i += 2;
                }
                "--debug" => {
                    debug = true;
                    i += 1;
                }
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("unicache version {}", unicache::VERSION);
                    std::process::exit(0);
                }
                flag if flag.starts_with('-') => bail!("unknown option: {}", flag),
                _ => {
                    positional.push(args[i].clone());
                    i += 1;
                }
            }
        }

        Ok(Self {
            dir,
            prefix,
            secret,
            ttl,
            debug,
            command: parse_command(positional)?,
        })
    }

    fn open(&self) -> FileCache {
        let options = DriverOptions::new()
            .with_prefix(self.prefix.clone())
            .with_debug(self.debug);

        FileCache::new(&self.dir)
            .with_options(options)
            .with_security_key(self.secret.clone())
    }
}

/// A dedicated subdirectory, so `clear` never removes the temp dir itself.
fn default_dir() -> PathBuf {
    std::env::temp_dir().join("unicache")
}

fn parse_command(mut positional: Vec<String>) -> anyhow::Result<Command> {
    if positional.is_empty() {
        bail!("missing command, see --help");
    }
    let name = positional.remove(0).to_lowercase();
    let mut args = positional.into_iter();

    let command = match name.as_str() {
        "get" => Command::Get(args.next().context("get requires a key")?),
        "has" => Command::Has(args.next().context("has requires a key")?),
        "set" => {
            let key = args.next().context("set requires a key")?;
            let value = args.next().context("set requires a value")?;
            Command::Set(key, value)
        }
        "del" => {
            let keys: Vec<String> = args.by_ref().collect();
            if keys.is_empty() {
                bail!("del requires at least one key");
            }
            Command::Del(keys)
        }
        "clear" => Command::Clear,
        other => bail!("unknown command: {}", other),
    };

    if args.next().is_some() {
        bail!("too many arguments for {}", name);
    }
    Ok(command)
}

/// Values that parse as JSON are stored as JSON, anything else as a string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn run(config: &Config) -> anyhow::Result<()> {
    let cache = config.open();
    debug!(dir = %cache.dir().display(), "Opened file cache");

    match &config.command {
        Command::Get(key) => match cache.get(key) {
            Some(value) => println!("{}", value),
            None => {
                if let Some(err) = cache.last_err() {
                    return Err(err).with_context(|| format!("failed to read {}", key));
                }
                println!("(nil)");
            }
        },
        Command::Has(key) => println!("{}", cache.has(key)),
        Command::Set(key, raw) => {
            cache
                .set(key, parse_value(raw), config.ttl)
                .with_context(|| format!("failed to set {}", key))?;
            println!("OK");
        }
        Command::Del(keys) => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            cache.del_multi(&keys)?;
            if let Some(err) = cache.last_err() {
                return Err(err).context("failed to delete some keys");
            }
            println!("OK");
        }
        Command::Clear => {
            cache.clear().context("failed to clear cache")?;
            println!("OK");
        }
    }

    Ok(())
}

fn print_help() {
    println!(
        r#"
unicache - inspect and edit a unicache file cache

USAGE:
    unicache [OPTIONS] <COMMAND> [ARGS]

COMMANDS:
    get <KEY>              Print the value of KEY, or (nil)
    has <KEY>              Print whether KEY holds a live value
    set <KEY> <VALUE>      Store VALUE (JSON if it parses, else a string)
    del <KEY> [KEY ...]    Remove keys
    clear                  Remove the whole cache directory

OPTIONS:
    -d, --dir <DIR>        Cache directory (default: <temp dir>/unicache)
        --prefix <PREFIX>  Cache file name prefix
        --secret <SECRET>  Security key used to derive file names
    -t, --ttl <SECONDS>    TTL for set (default: 0, never expires)
        --debug            Log every cache operation
    -v, --version          Print version information
    -h, --help             Print this help message

EXAMPLES:
    unicache -d ./cache set name '"inhere"' --ttl 60
    unicache -d ./cache get name
    unicache -d ./cache del name
"#
    );
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let config = Config::from_args(&args)?;

    // Set up logging (stderr, so stdout stays clean for values)
    let default_level = if config.debug { "debug" } else { "warn" };
    FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    run(&config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_set_with_options() {
        let config = Config::from_args(&args(&[
            "--dir", "/tmp/c", "--prefix", "p_", "set", "name", "42", "--ttl", "60",
        ]))
        .unwrap();

        assert_eq!(config.dir, PathBuf::from("/tmp/c"));
        assert_eq!(config.prefix, "p_");
        assert_eq!(config.ttl, Duration::from_secs(60));
        assert_eq!(config.command, Command::Set("name".into(), "42".into()));
    }

    #[test]
    fn test_parse_errors() {
        assert!(Config::from_args(&args(&[])).is_err());
        assert!(Config::from_args(&args(&["get"])).is_err());
        assert!(Config::from_args(&args(&["get", "a", "b"])).is_err());
        assert!(Config::from_args(&args(&["del"])).is_err());
        assert!(Config::from_args(&args(&["frobnicate"])).is_err());
        assert!(Config::from_args(&args(&["--ttl", "soon", "clear"])).is_err());
        assert!(Config::from_args(&args(&["--bogus", "clear"])).is_err());
        assert!(Config::from_args(&args(&["clear", "--dir"])).is_err());
    }

    #[test]
    fn test_default_dir_is_not_the_temp_dir() {
        let config = Config::from_args(&args(&["clear"])).unwrap();
        assert_eq!(config.dir, std::env::temp_dir().join("unicache"));
        assert_ne!(config.open().dir(), std::env::temp_dir());

        assert!(Config::from_args(&args(&["--dir", "", "clear"])).is_err());
    }

    #[test]
    fn test_parse_del_many() {
        let config = Config::from_args(&args(&["del", "a", "b"])).unwrap();
        assert_eq!(config.command, Command::Del(vec!["a".into(), "b".into()]));
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("42"), json!(42));
        assert_eq!(parse_value(r#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(parse_value("hello"), json!("hello"));
    }

    #[test]
    fn test_run_against_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().to_str().unwrap();

        let set = Config::from_args(&args(&["-d", dir, "set", "k", "[1,2]"])).unwrap();
        run(&set).unwrap();

        let cache = FileCache::new(tmp.path());
        assert_eq!(cache.get("k"), Some(json!([1, 2])));

        let del = Config::from_args(&args(&["-d", dir, "del", "k"])).unwrap();
        run(&del).unwrap();
        assert_eq!(FileCache::new(tmp.path()).get("k"), None);
    }
}
