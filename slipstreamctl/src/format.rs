//! Output formatting utilities for the CLI
//!
//! Provides table and JSON formatting with colors.

use anyhow::Result;
use colored::*;
use slipstream_core::{Module, Run, Usage, VirtualMachine};
use std::collections::BTreeMap;

use tabled::{settings::Style, Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

fn colored_status(status: &str) -> String {
    match status {
        "running" | "ready" | "done" | "success" => status.green().to_string(),
        "aborted" | "aborting" | "failed" | "error" => status.red().to_string(),
        "terminated" | "finalizing" | "cancelled" => status.dimmed().to_string(),
        other => other.yellow().to_string(),
    }
}

fn optional<T: ToString>(value: &Option<T>) -> String {
    value
        .as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "-".to_string())
}

/// Format a module or application listing
pub fn format_modules(modules: &[Module], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(modules)?),
        OutputFormat::Table => {
            #[derive(Tabled)]
            struct ModuleRow {
                #[tabled(rename = "Name")]
                name: String,
                #[tabled(rename = "Type")]
                kind: String,
                #[tabled(rename = "Version")]
                version: u64,
                #[tabled(rename = "Path")]
                path: String,
            }

            let rows = modules.iter().map(|m| ModuleRow {
                name: m.name.cyan().to_string(),
                kind: m.kind.to_string(),
                version: m.version,
                path: m.path.clone(),
            });

            Ok(Table::new(rows).with(Style::rounded()).to_string())
        }
    }
}

/// Format a run listing
pub fn format_runs(runs: &[Run], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(runs)?),
        OutputFormat::Table => {
            #[derive(Tabled)]
            struct RunRow {
                #[tabled(rename = "ID")]
                id: String,
                #[tabled(rename = "Module")]
                module: String,
                #[tabled(rename = "Status")]
                status: String,
                #[tabled(rename = "Started At")]
                started_at: String,
                #[tabled(rename = "Cloud")]
                cloud: String,
            }

            let rows = runs.iter().map(|r| RunRow {
                id: r.id.to_string(),
                module: r.module.clone(),
                status: colored_status(&r.status),
                started_at: r.started_at.clone(),
                cloud: r.cloud.clone(),
            });

            Ok(Table::new(rows).with(Style::rounded()).to_string())
        }
    }
}

/// Format a virtual machine listing
pub fn format_virtual_machines(vms: &[VirtualMachine], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(vms)?),
        OutputFormat::Table => {
            #[derive(Tabled)]
            struct VmRow {
                #[tabled(rename = "ID")]
                id: String,
                #[tabled(rename = "Cloud")]
                cloud: String,
                #[tabled(rename = "Status")]
                status: String,
                #[tabled(rename = "Run ID")]
                run_id: String,
            }

            let rows = vms.iter().map(|vm| VmRow {
                id: vm.id.clone(),
                cloud: vm.cloud.clone(),
                status: colored_status(&vm.status),
                run_id: optional(&vm.run_id),
            });

            Ok(Table::new(rows).with(Style::rounded()).to_string())
        }
    }
}

/// Format usage and quota per cloud
pub fn format_usage(usage: &[Usage], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(usage)?),
        OutputFormat::Table => {
            #[derive(Tabled)]
            struct UsageRow {
                #[tabled(rename = "Cloud")]
                cloud: String,
                #[tabled(rename = "Quota")]
                quota: u64,
                #[tabled(rename = "Run Usage")]
                run_usage: String,
                #[tabled(rename = "VM Usage")]
                vm_usage: String,
                #[tabled(rename = "Inactive VMs")]
                inactive_vm_usage: String,
                #[tabled(rename = "Others' VMs")]
                others_vm_usage: String,
                #[tabled(rename = "Pending VMs")]
                pending_vm_usage: String,
                #[tabled(rename = "Unknown VMs")]
                unknown_vm_usage: String,
            }

            let rows = usage.iter().map(|u| {
                let run_usage = if u.run_usage >= u.quota && u.quota > 0 {
                    u.run_usage.to_string().red().to_string()
                } else {
                    u.run_usage.to_string().green().to_string()
                };
                let cloud = if u.is_aggregate() {
                    u.cloud.bold().to_string()
                } else {
                    u.cloud.clone()
                };

                UsageRow {
                    cloud,
                    quota: u.quota,
                    run_usage,
                    vm_usage: optional(&u.vm_usage),
                    inactive_vm_usage: optional(&u.inactive_vm_usage),
                    others_vm_usage: optional(&u.others_vm_usage),
                    pending_vm_usage: optional(&u.pending_vm_usage),
                    unknown_vm_usage: optional(&u.unknown_vm_usage),
                }
            });

            Ok(Table::new(rows).with(Style::rounded()).to_string())
        }
    }
}

/// Format the alias map as `alias=command` lines, sorted by alias
pub fn format_aliases(aliases: &BTreeMap<String, String>, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(aliases)?),
        OutputFormat::Table => Ok(aliases
            .iter()
            .map(|(alias, command)| format!("{}={}", alias, command))
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// Format a success message
pub fn format_success(message: &str) -> String {
    format!("{} {}", "✓".green().bold(), message)
}

/// Format a warning message
pub fn format_warning(message: &str) -> String {
    format!("{} {}", "!".yellow().bold(), message)
}
