//! Output formatting utilities.

use colored::Colorize;
use relaygate_core::{PolicyEntry, RoleOp};
use relaygate_types::{Address, Batch, ChainId};
use tabled::{Table, Tabled};

/// Format address (short version).
pub fn format_address_short(addr: &Address) -> String {
    let s = addr.to_string();
    format!("{}...{}", &s[..10], &s[s.len() - 8..])
}

/// Hex with `0x` prefix.
pub fn format_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

pub fn print_success(msg: &str) {
    println!("{}", format!("✓ {}", msg).green());
}

pub fn print_error(msg: &str) {
    eprintln!("{}", format!("✗ {}", msg).red());
}

pub fn print_warning(msg: &str) {
    println!("{}", format!("⚠ {}", msg).yellow());
}

pub fn print_info(msg: &str) {
    println!("{}", format!("ℹ {}", msg).blue());
}

#[derive(Tabled)]
struct InstructionRow {
    #[tabled(rename = "#")]
    index: usize,
    target: String,
    value: u128,
    selector: String,
    #[tabled(rename = "payload bytes")]
    payload_len: usize,
}

pub fn batch_table(batch: &Batch) -> String {
    let rows: Vec<InstructionRow> = batch
        .iter()
        .enumerate()
        .map(|(index, ins)| InstructionRow {
            index,
            target: ins.target.to_string(),
            value: ins.value,
            selector: ins
                .selector()
                .map(|s| s.to_string())
                .unwrap_or_else(|| "-".to_string()),
            payload_len: ins.payload.len(),
        })
        .collect();
    Table::new(rows).to_string()
}

#[derive(Tabled)]
struct PolicyRow {
    target: String,
    selector: String,
    chain: ChainId,
    status: &'static str,
}

pub fn policy_table(entries: impl IntoIterator<Item = PolicyEntry>) -> String {
    let rows: Vec<PolicyRow> = entries
        .into_iter()
        .map(|entry| PolicyRow {
            target: entry.target.to_string(),
            selector: entry.selector.to_string(),
            chain: entry.chain_id,
            status: if entry.allowed { "allowed" } else { "denied" },
        })
        .collect();
    Table::new(rows).to_string()
}

#[derive(Tabled)]
struct MediatorRow {
    chain: ChainId,
    mediator: String,
}

pub fn mediator_table(records: impl IntoIterator<Item = (ChainId, Address)>) -> String {
    let rows: Vec<MediatorRow> = records
        .into_iter()
        .map(|(chain, mediator)| MediatorRow {
            chain,
            mediator: mediator.to_string(),
        })
        .collect();
    Table::new(rows).to_string()
}

/// Numbered plan of role operations.
pub fn print_role_plan(ops: &[RoleOp]) {
    println!("{}", "Role transition".bold());
    for (i, op) in ops.iter().enumerate() {
        let step = format!("{:>2}.", i + 1);
        match op {
            RoleOp::Revoke { .. } => println!("{} {}", step, op.to_string().red()),
            RoleOp::Grant { .. } => println!("{} {}", step, op.to_string().green()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaygate_types::{Instruction, Selector};

    #[test]
    fn test_format_address_short() {
        let short = format_address_short(&Address::repeat_byte(0xab));
        assert_eq!(short, "0xabababab...abababab");
    }

    #[test]
    fn test_batch_table() {
        let batch = Batch::new(vec![
            Instruction::call(Address::repeat_byte(1), Selector::from_bytes([0xa9, 0x05, 0x9c, 0xbb]), &[0; 4]),
            Instruction::new(Address::repeat_byte(2), 7, vec![1]),
        ])
        .unwrap();

        let table = batch_table(&batch);
        assert!(table.contains("0xa9059cbb"));
        assert!(table.contains("payload bytes"));
        assert!(table.contains(" - "));
    }

    #[test]
    fn test_policy_table() {
        let table = policy_table([PolicyEntry::deny(
            Address::repeat_byte(3),
            Selector::from_bytes([1, 2, 3, 4]),
            137,
        )]);
        assert!(table.contains("denied"));
        assert!(table.contains("137"));
    }
}
