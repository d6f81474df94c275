// UI layer: terminal rendering for command results and the interactive
// menu (`noipfraud shell`) built on `dialoguer`.

use crate::api::NoIPFraudClient;
use crate::campaign::{Campaign, CampaignStatus, CampaignUpdate, NewCampaign};
use crate::error::{ApiError, SftpError};
use crate::report::{BlockEntry, BlockFlag, StatusEntry};
use crate::sftp::ProbeReport;
use anyhow::Result;
use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, Password, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::time::Duration;

pub fn ok(msg: &str) {
    println!("{} {}", "✔".green(), msg);
}

pub fn fail(msg: &str) {
    println!("{} {}", "✘".red(), msg);
}

/// Spinner shown while a request is in flight. Call `finish_and_clear`
/// when done.
pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Run `f` behind a spinner.
pub fn with_spinner<T>(msg: &str, f: impl FnOnce() -> T) -> T {
    let pb = spinner(msg);
    let out = f();
    pb.finish_and_clear();
    out
}

fn status_text(code: Option<i64>) -> String {
    match code.and_then(CampaignStatus::from_code) {
        Some(CampaignStatus::Active) => "active".green().to_string(),
        Some(CampaignStatus::BlockAll) => "block all".red().to_string(),
        Some(status) => status.label().yellow().to_string(),
        None => code.map_or_else(|| "-".to_string(), |c| format!("code {}", c)),
    }
}

pub fn print_campaigns(campaigns: &[Campaign]) {
    if campaigns.is_empty() {
        println!("No campaigns.");
        return;
    }
    println!("{:<12} {:<30} {:<12} {:>8} {:>8}", "ID", "NAME", "STATUS", "CLICKS", "BLOCKED");
    for c in campaigns {
        println!(
            "{:<12} {:<30} {:<12} {:>8} {:>8}",
            c.name,
            c.info,
            status_text(c.active),
            c.total_clicks(),
            c.blocked_clicks()
        );
    }
    println!("{} campaign(s)", campaigns.len());
}

pub fn print_status_report(report: &[StatusEntry]) {
    for entry in report {
        println!(
            "{:<12} {:<30} {:<12} {}",
            entry.campaign_id,
            entry.campaign_name,
            status_text(entry.status),
            entry.fakeurl.as_deref().unwrap_or("-")
        );
    }
    println!("{} campaign(s)", report.len());
}

pub fn print_block_report(report: &[BlockEntry]) {
    for e in report {
        let flag = match e.flag {
            BlockFlag::High => e.flag.to_string().red().bold().to_string(),
            BlockFlag::Ok => e.flag.to_string().green().to_string(),
        };
        println!(
            "{} {:<12} {:<30} {:>6} clicks {:>6.2}% blocked {}",
            e.date, e.campaign_id, e.campaign_name, e.total, e.block_rate, flag
        );
    }
    println!("{} campaign(s)", report.len());
}

pub fn print_bulk_results(results: &BTreeMap<String, bool>) {
    for (id, success) in results {
        if *success {
            ok(id);
        } else {
            fail(id);
        }
    }
    let done = results.values().filter(|s| **s).count();
    println!("{}/{} succeeded", done, results.len());
}

pub fn print_probe(name: &str, result: &Result<ProbeReport, SftpError>) {
    println!("{}", format!("== {}", name).bold());
    let report = match result {
        Ok(report) => report,
        Err(e) => {
            fail(&e.to_string());
            return;
        }
    };
    ok("SSH connected, SFTP session opened");
    match &report.root_entries {
        Some(entries) => {
            for entry in entries {
                let kind = if entry.is_dir { "dir " } else { "file" };
                println!("   {} {}", kind.dark_grey(), entry.name);
            }
        }
        None => fail("could not list login directory"),
    }
    match &report.web_root {
        Some(root) => {
            ok(&format!("web root {} ({} items, {} php)", root.path, root.item_count, root.php_count));
            for php in &root.php_files {
                println!("      {}", php);
            }
        }
        None => println!("   no web root found"),
    }
}

pub fn prompt_username() -> Result<String> {
    Ok(Input::new().with_prompt("Username").interact_text()?)
}

pub fn prompt_password() -> Result<String> {
    Ok(Password::new().with_prompt("Password").interact()?)
}

/// Main interactive menu. Runs a select loop until the user chooses
/// "Exit". Request failures are printed and the loop continues.
pub fn main_menu(mut api: NoIPFraudClient) -> Result<()> {
    let items = [
        "List campaigns",
        "Change status",
        "Get embed code",
        "Status report",
        "Block report (yesterday)",
        "Create campaign",
        "Update campaign",
        "Exit",
    ];
    loop {
        let selection = Select::new().items(&items[..]).default(0).interact()?;
        let outcome = match selection {
            0 => with_spinner("Loading campaigns...", || api.list_campaigns(None, None))
                .map(|c| print_campaigns(&c)),
            1 => handle_change_status(&mut api)?,
            2 => {
                let id: String = Input::new().with_prompt("Campaign ID").interact_text()?;
                with_spinner("Fetching embed code...", || api.embed_code(&id)).map(|code| println!("{}", code))
            }
            3 => with_spinner("Building report...", || api.status_report())
                .map(|r| print_status_report(&r)),
            4 => with_spinner("Building report...", || api.block_report(None))
                .map(|r| print_block_report(&r)),
            5 => handle_create(&mut api)?,
            6 => handle_update(&mut api)?,
            _ => break,
        };
        if let Err(e) = outcome {
            fail(&e.to_string());
        }
    }
    Ok(())
}

fn select_status() -> Result<CampaignStatus> {
    let labels: Vec<&str> = CampaignStatus::ALL.iter().map(|s| s.label()).collect();
    let idx = Select::new().with_prompt("Status").items(&labels).default(1).interact()?;
    Ok(CampaignStatus::ALL[idx])
}

fn handle_change_status(api: &mut NoIPFraudClient) -> Result<Result<(), ApiError>> {
    let id: String = Input::new().with_prompt("Campaign ID").interact_text()?;
    let status = select_status()?;
    Ok(with_spinner("Changing status...", || api.change_status(&id, status))
        .map(|()| ok(&format!("{} is now {}", id, status))))
}

fn handle_create(api: &mut NoIPFraudClient) -> Result<Result<(), ApiError>> {
    let name: String = Input::new().with_prompt("Campaign name").interact_text()?;
    let safe: String = Input::new().with_prompt("Safe URL").interact_text()?;
    let money: String = Input::new().with_prompt("Money URL").interact_text()?;
    let countries: String = Input::new()
        .with_prompt("Countries (comma separated)")
        .default("th".into())
        .interact_text()?;
    let mobile_only = Confirm::new().with_prompt("Mobile only?").default(true).interact()?;

    let mut new = NewCampaign::new(&name, &safe, &money);
    new.countries = split_countries(&countries);
    new.mobile_only = mobile_only;
    Ok(with_spinner("Creating campaign...", || api.create_campaign(&new)).map(|created| {
        let id = created.get("name").and_then(|v| v.as_str()).unwrap_or("?");
        ok(&format!("created campaign {}", id));
    }))
}

fn handle_update(api: &mut NoIPFraudClient) -> Result<Result<(), ApiError>> {
    let id: String = Input::new().with_prompt("Campaign ID").interact_text()?;
    let info: String = Input::new()
        .with_prompt("New name (empty keeps current)")
        .allow_empty(true)
        .interact_text()?;
    let safe: String = Input::new()
        .with_prompt("New safe URL (empty keeps current)")
        .allow_empty(true)
        .interact_text()?;
    let update = CampaignUpdate {
        info: Some(info).filter(|s| !s.is_empty()),
        safe_url: Some(safe).filter(|s| !s.is_empty()),
        ..CampaignUpdate::default()
    };
    if update.is_empty() {
        println!("Nothing to change.");
        return Ok(Ok(()));
    }
    Ok(with_spinner("Updating campaign...", || api.update_campaign(&id, &update))
        .map(|()| ok(&format!("updated {}", id))))
}

/// `"th, vn,,"` -> `["th", "vn"]`, lowercased.
pub fn split_countries(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|c| c.trim().to_ascii_lowercase())
        .filter(|c| !c.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countries_are_trimmed_and_lowercased() {
        assert_eq!(split_countries(" TH, vn,,"), vec!["th", "vn"]);
        assert!(split_countries("").is_empty());
    }

    #[test]
    fn unknown_status_codes_are_shown_raw() {
        assert_eq!(status_text(Some(7)), "code 7");
        assert_eq!(status_text(None), "-");
    }
}
