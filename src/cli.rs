// Command-line interface: clap definitions and dispatch. Each subcommand
// builds what it needs (API client or server inventory), runs one
// operation and renders the result through `ui`.

use crate::api::NoIPFraudClient;
use crate::campaign::{BulkUpdateItem, CampaignStatus, CampaignUpdate, MoneyUrl, NewCampaign, Rules};
use crate::config::{
    default_inventory_path, ApiConfig, ServerInventory, DEFAULT_TIMEOUT_SECS, DEFAULT_TOKEN_TTL_HOURS,
    MAX_TOKEN_TTL_HOURS,
};
use crate::session::SessionStore;
use crate::{report, sftp, ui};
use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "noipfraud", author, version, about = "Manage noIPFraud campaigns and probe landing servers")]
pub struct Cli {
    #[command(flatten)]
    pub api: ApiArgs,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Connection settings. Optional here so commands that don't talk to the
/// API (sftp) work without them.
#[derive(Args, Debug, Clone, Default)]
pub struct ApiArgs {
    /// Base URL of the admin API, e.g. https://example.com/admin/api
    #[arg(long, env = "NOIPFRAUD_BASE_URL", global = true)]
    pub base_url: Option<String>,

    #[arg(long, env = "NOIPFRAUD_USERNAME", global = true)]
    pub username: Option<String>,

    #[arg(long, env = "NOIPFRAUD_PASSWORD", global = true, hide_env_values = true)]
    pub password: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS, global = true)]
    pub timeout_secs: u64,

    /// How long a login token is trusted before logging in again (1 to 8760)
    #[arg(
        long,
        default_value_t = DEFAULT_TOKEN_TTL_HOURS,
        value_parser = clap::value_parser!(i64).range(1..=MAX_TOKEN_TTL_HOURS),
        global = true
    )]
    pub token_ttl_hours: i64,

    /// Don't read or write the cached session
    #[arg(long, global = true)]
    pub no_cache: bool,
}

impl ApiArgs {
    pub fn to_config(&self) -> Result<ApiConfig> {
        let base_url = self
            .base_url
            .as_deref()
            .context("missing --base-url (or NOIPFRAUD_BASE_URL)")?;
        let username = self
            .username
            .as_deref()
            .context("missing --username (or NOIPFRAUD_USERNAME)")?;
        let password = self
            .password
            .as_deref()
            .context("missing --password (or NOIPFRAUD_PASSWORD)")?;
        if !(1..=MAX_TOKEN_TTL_HOURS).contains(&self.token_ttl_hours) {
            bail!("--token-ttl-hours must be between 1 and {}", MAX_TOKEN_TTL_HOURS);
        }
        Ok(ApiConfig::new(base_url, username, password)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_token_ttl(chrono::Duration::hours(self.token_ttl_hours)))
    }

    pub fn client(&self) -> Result<NoIPFraudClient> {
        let client = NoIPFraudClient::new(self.to_config()?).context("Failed to build HTTP client")?;
        Ok(if self.no_cache {
            client
        } else {
            client.with_store(SessionStore::default_location())
        })
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and cache the session token
    Login,
    /// Forget the cached session token
    Logout,
    /// List campaigns with click counters
    List {
        /// First day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        from: Option<NaiveDate>,
        /// Last day (YYYY-MM-DD), defaults to --from
        #[arg(long)]
        to: Option<NaiveDate>,
        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a campaign (starts under review)
    Create {
        /// Display name
        name: String,
        #[arg(long)]
        safe_url: String,
        #[arg(long)]
        money_url: String,
        /// Allowed country code, repeatable (default: th)
        #[arg(long = "country")]
        countries: Vec<String>,
        /// Allow desktop traffic too
        #[arg(long)]
        all_devices: bool,
        /// Traffic source id
        #[arg(long, default_value = crate::campaign::FACEBOOK_TRAFFIC_SOURCE)]
        traffic: String,
    },
    /// Change fields of an existing campaign
    Update {
        /// Campaign id
        id: String,
        #[arg(long)]
        info: Option<String>,
        #[arg(long)]
        safe_url: Option<String>,
        /// Replace destinations with this single URL
        #[arg(long)]
        money_url: Option<String>,
        #[arg(long)]
        status: Option<CampaignStatus>,
        #[arg(long)]
        traffic: Option<String>,
        /// Replace country targeting, repeatable
        #[arg(long = "country")]
        countries: Vec<String>,
        /// With --country: allow desktop traffic too
        #[arg(long, requires = "countries")]
        all_devices: bool,
    },
    /// Apply updates from a JSON file: [{"campaign_id": "...", "fakeurl": "...", ...}]
    BulkUpdate { file: PathBuf },
    /// Change the status of one or more campaigns (review, active, allow-all, block-all)
    Status {
        #[arg(allow_negative_numbers = true)]
        status: CampaignStatus,
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Print PHP embed codes (all campaigns when no id is given)
    Embed { ids: Vec<String> },
    /// Daily statistics for a campaign
    Stats {
        id: String,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Campaign reports
    Report {
        #[command(subcommand)]
        kind: ReportKind,
    },
    /// Test SFTP connectivity to the servers in the inventory file
    Sftp {
        /// Inventory file (default: <config dir>/noipfraud/servers.toml)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Only probe these servers
        servers: Vec<String>,
    },
    /// Interactive menu
    Shell,
}

#[derive(Subcommand, Debug)]
pub enum ReportKind {
    /// Status of every campaign
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Block rate per campaign for one day
    Blocks {
        /// Day to check (YYYY-MM-DD), defaults to yesterday
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        json: bool,
    },
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn targeting(countries: Vec<String>, all_devices: bool) -> Option<Rules> {
    if countries.is_empty() {
        return None;
    }
    let countries = countries.iter().map(|c| c.to_ascii_lowercase()).collect();
    Some(Rules::targeting(countries, !all_devices))
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Login => {
            let mut api = cli.api.client()?;
            let session = ui::with_spinner("Logging in...", || api.login().cloned()).context("Login failed")?;
            ui::ok("login successful");
            println!("account  {}@{}", api.config().username, api.config().base_url);
            let preview: String = session.token.chars().take(12).collect();
            println!("token    {}... ({} chars)", preview, session.token.len());
            println!("expires  {}", session.expires_at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S"));
        }
        Commands::Logout => {
            let store = SessionStore::default_location();
            if store.clear()? {
                ui::ok("cached session removed");
            } else {
                println!("No cached session.");
            }
        }
        Commands::List { from, to, json } => {
            let mut api = cli.api.client()?;
            let campaigns = ui::with_spinner("Loading campaigns...", || api.list_campaigns(from, to))?;
            if json {
                print_json(&campaigns)?;
            } else {
                ui::print_campaigns(&campaigns);
            }
        }
        Commands::Create { name, safe_url, money_url, countries, all_devices, traffic } => {
            let mut api = cli.api.client()?;
            let mut new = NewCampaign::new(&name, &safe_url, &money_url);
            if !countries.is_empty() {
                new.countries = countries.iter().map(|c| c.to_ascii_lowercase()).collect();
            }
            new.mobile_only = !all_devices;
            new.traffic_source = traffic;
            let created = ui::with_spinner("Creating campaign...", || api.create_campaign(&new))
                .context("Create campaign failed")?;
            let id = created.get("name").and_then(|v| v.as_str()).unwrap_or("?");
            ui::ok(&format!("created campaign {} ({})", id, name));
            print_json(&created)?;
        }
        Commands::Update { id, info, safe_url, money_url, status, traffic, countries, all_devices } => {
            let update = CampaignUpdate {
                info,
                active: status,
                safe_url,
                money_urls: money_url.as_deref().map(|url| vec![MoneyUrl::single(url)]),
                rules: targeting(countries, all_devices),
                traffic,
            };
            if update.is_empty() {
                bail!("nothing to update; pass at least one field");
            }
            let mut api = cli.api.client()?;
            ui::with_spinner("Updating campaign...", || api.update_campaign(&id, &update))
                .with_context(|| format!("Update of {} failed", id))?;
            ui::ok(&format!("updated {}", id));
        }
        Commands::BulkUpdate { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let items: Vec<BulkUpdateItem> =
                serde_json::from_str(&text).with_context(|| format!("Parsing {}", file.display()))?;
            let updates: Vec<(String, CampaignUpdate)> =
                items.into_iter().map(|i| (i.campaign_id, i.update)).collect();
            info!(count = updates.len(), "Applying bulk update");
            let mut api = cli.api.client()?;
            let results = ui::with_spinner("Updating campaigns...", || api.bulk_update(&updates));
            ui::print_bulk_results(&results);
        }
        Commands::Status { status, ids } => {
            let mut api = cli.api.client()?;
            let results = ui::with_spinner("Changing status...", || api.bulk_change_status(&ids, status));
            println!("target status: {}", status);
            ui::print_bulk_results(&results);
        }
        Commands::Embed { ids } => {
            let mut api = cli.api.client()?;
            let codes = ui::with_spinner("Fetching embed codes...", || api.all_embed_codes(&ids))?;
            for (id, code) in &codes {
                match code {
                    Some(code) => {
                        println!("// ==== {} ====", id);
                        println!("{}", code);
                    }
                    None => ui::fail(&format!("{}: no embed code", id)),
                }
            }
        }
        Commands::Stats { id, from, to } => {
            let mut api = cli.api.client()?;
            let from = from.unwrap_or_else(|| Local::now().date_naive());
            let to = to.unwrap_or(from);
            let stats = ui::with_spinner("Loading stats...", || api.campaign_stats(&id, from, to))?;
            print_json(&stats)?;
        }
        Commands::Report { kind } => {
            let mut api = cli.api.client()?;
            match kind {
                ReportKind::Status { json } => {
                    let entries = ui::with_spinner("Building report...", || api.status_report())?;
                    if json {
                        print_json(&entries)?;
                    } else {
                        ui::print_status_report(&entries);
                    }
                }
                ReportKind::Blocks { date, json } => {
                    let date = date.unwrap_or_else(report::yesterday);
                    let entries = ui::with_spinner("Building report...", || api.block_report(Some(date)))?;
                    if json {
                        print_json(&entries)?;
                    } else {
                        ui::print_block_report(&entries);
                    }
                }
            }
        }
        Commands::Sftp { config, servers } => {
            let path = config.unwrap_or_else(default_inventory_path);
            let selected = ServerInventory::load(&path)?.select(&servers)?;
            if selected.is_empty() {
                bail!("no servers configured in {}", path.display());
            }
            let results = sftp::probe_all(&selected);
            for (name, result) in &results {
                ui::print_probe(name, result);
                println!();
            }
            println!("SUMMARY");
            for (name, result) in &results {
                if result.is_ok() {
                    ui::ok(&format!("{}: connected", name));
                } else {
                    ui::fail(&format!("{}: failed", name));
                }
            }
        }
        Commands::Shell => {
            let mut args = cli.api;
            if args.username.is_none() {
                args.username = Some(ui::prompt_username()?);
            }
            if args.password.is_none() {
                args.password = Some(ui::prompt_password()?);
            }
            ui::main_menu(args.client()?)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn status_accepts_negative_code_and_names() {
        let cli = parse(&["noipfraud", "status", "-1", "a1", "b2"]);
        match cli.command {
            Commands::Status { status, ids } => {
                assert_eq!(status, CampaignStatus::BlockAll);
                assert_eq!(ids, vec!["a1", "b2"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
        let cli = parse(&["noipfraud", "status", "allow-all", "a1"]);
        assert!(matches!(cli.command, Commands::Status { status: CampaignStatus::AllowAll, .. }));
    }

    #[test]
    fn status_requires_an_id() {
        assert!(Cli::try_parse_from(["noipfraud", "status", "active"]).is_err());
    }

    #[test]
    fn list_parses_dates() {
        let cli = parse(&["noipfraud", "list", "--from", "2025-10-01", "--to", "2025-10-31"]);
        match cli.command {
            Commands::List { from, to, json } => {
                assert_eq!(from, NaiveDate::from_ymd_opt(2025, 10, 1));
                assert_eq!(to, NaiveDate::from_ymd_opt(2025, 10, 31));
                assert!(!json);
            }
            other => panic!("unexpected command {:?}", other),
        }
        assert!(Cli::try_parse_from(["noipfraud", "list", "--from", "31/10/2025"]).is_err());
    }

    #[test]
    fn create_defaults_to_facebook_traffic() {
        let cli = parse(&[
            "noipfraud", "create", "Promo", "--safe-url", "https://s.example/", "--money-url", "https://m.example/",
            "--country", "TH", "--country", "vn",
        ]);
        match cli.command {
            Commands::Create { countries, traffic, all_devices, .. } => {
                assert_eq!(traffic, crate::campaign::FACEBOOK_TRAFFIC_SOURCE);
                assert!(!all_devices);
                let rules = targeting(countries, all_devices).unwrap();
                assert_eq!(rules.country.values, Some(vec!["th".to_string(), "vn".to_string()]));
                assert_eq!(rules.mobile.values, Some(vec![]));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn api_args_need_all_credentials() {
        let args = ApiArgs {
            base_url: Some("https://example.com/admin/api/".into()),
            username: Some("user".into()),
            password: None,
            timeout_secs: 30,
            token_ttl_hours: 5,
            no_cache: true,
        };
        let err = args.to_config().unwrap_err();
        assert!(err.to_string().contains("--password"));

        let args = ApiArgs { password: Some("pw".into()), ..args };
        let config = args.to_config().unwrap();
        assert_eq!(config.base_url, "https://example.com/admin/api");
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn api_args_reject_non_positive_ttl() {
        let args = ApiArgs {
            base_url: Some("https://example.com".into()),
            username: Some("user".into()),
            password: Some("pw".into()),
            timeout_secs: 30,
            token_ttl_hours: 0,
            no_cache: true,
        };
        assert!(args.to_config().is_err());
    }

    #[test]
    fn ttl_beyond_a_year_is_rejected_at_parse_time() {
        let err = Cli::try_parse_from(["noipfraud", "--token-ttl-hours", "3000000000", "login"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
        assert!(Cli::try_parse_from(["noipfraud", "--token-ttl-hours", "0", "login"]).is_err());
        let cli = parse(&["noipfraud", "--token-ttl-hours", "8760", "login"]);
        assert_eq!(cli.api.token_ttl_hours, MAX_TOKEN_TTL_HOURS);
    }

    #[test]
    fn api_args_reject_huge_ttl() {
        let args = ApiArgs {
            base_url: Some("https://example.com".into()),
            username: Some("user".into()),
            password: Some("pw".into()),
            timeout_secs: 30,
            token_ttl_hours: 3_000_000_000,
            no_cache: true,
        };
        let err = args.to_config().unwrap_err();
        assert!(err.to_string().contains("--token-ttl-hours"));
    }
}
