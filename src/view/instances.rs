//! Compute instance tables

use super::{instant_cell, section_block, yes_no, Block, Table, View};
use crate::resource::detail::InstanceDefinition;
use crate::resource::model::{FirewallRule, InstanceSummary};
use crate::resource::{ClassifiedError, GroupedList};

const LIST_HEADER: &[&str] = &[
    "Name",
    "ID",
    "Type",
    "Zone",
    "Internal IP",
    "External IP",
    "Launched",
];

const RULE_HEADER: &[&str] = &[
    "Rule",
    "Priority",
    "Action",
    "Protocol",
    "Port Range",
    "Peer",
    "Description",
];

/// One table per state
pub(super) fn list(list: &GroupedList<InstanceSummary>) -> View {
    let tables = list
        .groups
        .iter()
        .map(|(state, instances)| {
            let mut table = Table::new(
                Some(&format!("{} ({})", state, instances.len())),
                LIST_HEADER,
            );
            for i in instances {
                table.push_row(vec![
                    i.name.clone(),
                    i.id.clone(),
                    i.machine_type.clone(),
                    i.zone.clone(),
                    i.internal_ip.clone(),
                    i.external_ip.clone(),
                    instant_cell(&i.launched),
                ]);
            }
            table
        })
        .collect();
    View::listing(tables, list.status.as_ref())
}

fn rule_table(title: &str, rules: &[FirewallRule]) -> Block {
    if rules.is_empty() {
        return Block::notice(
            Some(title),
            &ClassifiedError::empty(format!("no {} apply", title.to_lowercase())),
        );
    }
    let mut table = Table::new(Some(title), RULE_HEADER);
    for r in rules {
        table.push_row(vec![
            r.rule.clone(),
            r.priority.clone(),
            r.action.clone(),
            r.protocol.clone(),
            r.port_range.clone(),
            r.peer.clone(),
            r.description.clone(),
        ]);
    }
    Block::Table(table)
}

/// Summary, Details, Ingress Rules, Egress Rules, Volumes, Networks
pub(super) fn definition(def: &InstanceDefinition) -> View {
    let s = &def.summary;
    let d = &def.detail;
    let mut blocks = Vec::with_capacity(7);

    let mut summary = Table::new(
        Some("Summary"),
        &["Name", "ID", "State", "Type", "Zone", "Launched"],
    );
    summary.push_row(vec![
        s.name.clone(),
        s.id.clone(),
        s.state.clone(),
        s.machine_type.clone(),
        s.zone.clone(),
        instant_cell(&s.launched),
    ]);
    blocks.push(Block::Table(summary));

    blocks.push(Block::Table(Table::key_value(
        "Details",
        vec![
            ("CPU Platform", d.cpu_platform.clone()),
            ("Created", instant_cell(&d.created)),
            ("Internal IP", s.internal_ip.clone()),
            ("External IP", s.external_ip.clone()),
            ("Deletion Protection", yes_no(d.deletion_protection)),
            ("Service Accounts", d.service_accounts_display()),
            ("Network Tags", d.network_tags_display()),
            ("Labels", d.labels_display()),
            ("Description", d.description.clone()),
        ],
    )));

    blocks.push(section_block("Ingress Rules", &def.rules, |rules| {
        rule_table("Ingress Rules", &rules.ingress)
    }));
    blocks.push(section_block("Egress Rules", &def.rules, |rules| {
        rule_table("Egress Rules", &rules.egress)
    }));

    blocks.push(section_block("Volumes", &def.volumes, |volumes| {
        let mut table = Table::new(
            Some("Volumes"),
            &["Name", "Device", "Size (GB)", "Type", "Status", "Boot", "Auto Delete", "Mode", "Created"],
        );
        for v in volumes {
            table.push_row(vec![
                v.name.clone(),
                v.device.clone(),
                v.size_gb.clone(),
                v.disk_type.clone(),
                v.status.clone(),
                yes_no(v.boot),
                yes_no(v.auto_delete),
                v.mode.clone(),
                instant_cell(&v.created),
            ]);
        }
        Block::Table(table)
    }));

    blocks.push(section_block("Networks", &def.network_interfaces, |nics| {
        let mut table = Table::new(
            Some("Networks"),
            &["Interface", "Network", "Subnetwork", "Internal IP", "External IP", "Stack"],
        );
        for n in nics {
            table.push_row(vec![
                n.name.clone(),
                n.network.clone(),
                n.subnetwork.clone(),
                n.internal_ip.clone(),
                n.external_ip.clone(),
                n.stack_type.clone(),
            ]);
        }
        Block::Table(table)
    }));

    if let Some(status) = &def.status {
        blocks.push(Block::notice(None, status));
    }

    View::Compound(blocks)
}
