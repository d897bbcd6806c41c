use std::io::Write;

use anyhow::Result;

use crate::application::LedgerService;
use crate::domain::UserId;
use crate::storage::{LedgerStore, UserDirectory};

/// Writes a user's statement in portable formats.
pub struct StatementExporter<'a, S, D> {
    service: &'a LedgerService<S, D>,
}

impl<'a, S, D> StatementExporter<'a, S, D>
where
    S: LedgerStore,
    D: UserDirectory,
{
    pub fn new(service: &'a LedgerService<S, D>) -> Self {
        Self { service }
    }

    /// Export the user's entries as CSV, one row per entry in creation order.
    /// Returns the number of rows written.
    pub async fn export_csv<W: Write>(&self, owner_id: UserId, writer: W) -> Result<usize> {
        let statement = self.service.get_balance_and_history(owner_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "created_at",
            "kind",
            "amount",
            "counterparty_id",
            "description",
        ])?;

        for entry in &statement.entries {
            csv_writer.write_record([
                entry.id.to_string(),
                entry.created_at.to_rfc3339(),
                entry.kind.as_str().to_string(),
                entry.amount.to_string(),
                entry
                    .counterparty_id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                entry.description.clone(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(statement.entries.len())
    }

    /// Export the user's balance and entries as pretty-printed JSON.
    pub async fn export_json<W: Write>(&self, owner_id: UserId, mut writer: W) -> Result<()> {
        let statement = self.service.get_balance_and_history(owner_id).await?;
        serde_json::to_writer_pretty(&mut writer, &statement)?;
        writeln!(writer)?;
        Ok(())
    }
}
