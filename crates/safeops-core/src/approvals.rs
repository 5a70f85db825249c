//! Approvals ledger decoding.
//!
//! The backend serves `APPROVALS.md` verbatim as a pipe-delimited table:
//!
//! ```text
//! | appr_id | task_id | status  | requested_by | approver | ts_req     |
//! |---------|---------|---------|--------------|----------|------------|
//! | A-1     | T-9     | pending | alice        | bob      | 2025-01-01 |
//! ```

use crate::model::{Approval, ApprovalStatus};

const HEADER_TOKEN: &str = "appr_id";
const MIN_CELLS: usize = 6;

/// Decodes every well-formed data row of the ledger. Header, separator and
/// short rows are skipped; this never fails.
#[must_use]
pub fn parse_approvals(text: &str) -> Vec<Approval> {
    text.lines().filter_map(parse_row).collect()
}

fn parse_row(line: &str) -> Option<Approval> {
    if !line.contains('|') || line.contains("---") {
        return None;
    }

    let cells: Vec<&str> =
        line.split('|').map(str::trim).filter(|cell| !cell.is_empty()).collect();
    if cells.len() < MIN_CELLS || cells[0] == HEADER_TOKEN {
        return None;
    }

    Some(Approval {
        appr_id: cells[0].to_string(),
        task_id: cells[1].to_string(),
        status: ApprovalStatus::from_raw(cells[2]),
        requested_by: cells[3].to_string(),
        approver: cells[4].to_string(),
        ts_req: cells[5].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEDGER: &str = "\
| appr_id | task_id | status | requested_by | approver | ts_req |
|---------|---------|--------|--------------|----------|--------|
| A-1 | T-1 | approved | alice | bob | 2025-01-01T00:00:00Z |
| A-2 | T-2 | pending | carol | dave | 2025-01-02T00:00:00Z |
";

    #[test]
    fn parses_data_rows_and_skips_header_and_separator() {
        let approvals = parse_approvals(LEDGER);
        assert_eq!(approvals.len(), 2);
        assert_eq!(approvals[0].appr_id, "A-1");
        assert_eq!(approvals[0].status, ApprovalStatus::Approved);
        assert_eq!(approvals[1].requested_by, "carol");
        assert_eq!(approvals[1].ts_req, "2025-01-02T00:00:00Z");
    }

    #[test]
    fn accepts_rows_without_outer_pipes() {
        let approvals = parse_approvals("appr1|task1|pending|user1|auditor1|2024-01-01");
        assert_eq!(approvals.len(), 1);
        assert_eq!(approvals[0].task_id, "task1");
        assert_eq!(approvals[0].approver, "auditor1");
    }

    #[test]
    fn unknown_status_becomes_pending() {
        let approvals = parse_approvals("|A-9|T-9|escalated|x|y|z|");
        assert_eq!(approvals[0].status, ApprovalStatus::Pending);
    }

    #[test]
    fn malformed_and_empty_input_yield_nothing() {
        for input in [
            "",
            "\n\n",
            "no pipes here",
            "| only | three | cells |",
            "|---|---|---|---|---|---|",
            "| appr_id | task_id | status | requested_by | approver | ts_req |",
            "|||||||||",
            "\u{0}|\u{7f}|",
        ] {
            assert!(parse_approvals(input).is_empty(), "input {input:?} should not parse");
        }
    }

    #[test]
    fn short_rows_are_skipped_without_affecting_neighbours() {
        let text = "|A-1|T-1|approved|a|b|c|\n|broken|row|\n|A-2|T-2|expired|a|b|c|";
        let ids: Vec<_> = parse_approvals(text).into_iter().map(|a| a.appr_id).collect();
        assert_eq!(ids, vec!["A-1", "A-2"]);
    }
}
