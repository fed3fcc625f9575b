//! Newsletters sheet: one Mailchimp campaign per row, id in column A.

use crate::columns::{RuleSet, bind_headers};
use crate::error::ReconcileError;
use crate::policy::FillDecision;
use crate::sheets::{CampaignDocs, SheetPass};

const HEADER_ROW: u32 = 1;
const ID_COL: u32 = 1;

pub fn reconcile(pass: &mut SheetPass<'_, '_>) -> Result<(), ReconcileError> {
    let columns = bind_headers(&*pass.sheet, HEADER_ROW, ID_COL + 1, RuleSet::Newsletters)?;

    for row in HEADER_ROW + 1..=pass.sheet.max_row() {
        let Some(campaign_id) = pass.sheet.text(row, ID_COL) else {
            continue;
        };
        let mut docs = CampaignDocs::default();
        for column in &columns {
            let mode = column.rule.fill_mode();
            if pass.decide(row, column.col, mode, None) != FillDecision::Fill {
                continue;
            }
            if let Some(value) = docs.resolve(pass, &column.rule, &campaign_id, row, ID_COL)? {
                pass.put(row, column.col, mode, value);
            }
        }
    }
    Ok(())
}
