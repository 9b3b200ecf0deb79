use anyhow::Result;
use colored::Colorize;
use dispatch::{Host, HostSet};

use crate::Context;
use crate::cli::HostsArgs;
use crate::ui;

pub fn run(ctx: &Context, args: HostsArgs) -> Result<()> {
    let config = super::load_cluster(ctx)?;
    let hosts = super::select(&config, &args.selection)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(hosts.as_slice())?);
        return Ok(());
    }

    if hosts.is_empty() {
        ui::warn("No hosts selected");
        return Ok(());
    }

    ui::header(&format!("Hosts ({})", hosts.len()));
    for line in rows(&hosts) {
        println!("{line}");
    }

    println!();
    let contents = config.cluster().content_ids();
    ui::kv("Segments", &ui::count(contents.len(), "content id"));
    Ok(())
}

fn rows(hosts: &HostSet) -> Vec<String> {
    let width = hosts
        .ids()
        .map(|id| id.as_str().len())
        .max()
        .unwrap_or_default();
    hosts.iter().map(|host| row(host, width)).collect()
}

fn row(host: &Host, width: usize) -> String {
    let content = host
        .content_id
        .map_or_else(|| "-".to_string(), |c| c.to_string());
    let mut line = format!(
        "  {:<width$}  {:<11}  {:>3}",
        host.id.as_str(),
        host.role.as_str(),
        content
    );
    if let Some(dir) = &host.data_dir {
        line.push_str(&format!("  {}", dir.dimmed()));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch::Role;

    #[test]
    fn test_rows_are_aligned() {
        colored::control::set_override(false);
        let hosts = HostSet::new(vec![
            Host::coordinator("cdw").with_port(5432),
            Host::segment(10, Role::Primary, "sdw1", 6000).with_data_dir("/data/gpseg10"),
            Host::new("etl"),
        ])
        .unwrap();

        assert_eq!(
            rows(&hosts),
            vec![
                "  cdw:5432   coordinator   -1",
                "  sdw1:6000  primary       10  /data/gpseg10",
                "  etl        primary        -",
            ]
        );
    }
}
