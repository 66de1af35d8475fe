// ai
//! 📮 Dispatcher: one write, maybe one alias, zero retries.
//!
//! 🎬 *[the document is sealed, stamped, and addressed. the dispatcher drops it in the slot.]*
//! *[if the address was a dated index, it also mails a postcard to the alias: "moved in!"]*
//! *[if the postcard gets lost, the document still lives there. the postcard was a courtesy.]*
//!
//! 🧠 Knowledge graph:
//! - Write failure → [`ForwardError::Submission`], returned. The sink facade counts it.
//! - Alias failure → [`ForwardError::Alias`], logged at warn and swallowed right here.
//!   The document is already indexed; discoverability is a convenience, not correctness.
//! - No document id is ever sent. The store mints one.

use tracing::{trace, warn};

use crate::backends::SearchStore;
use crate::document::Document;
use crate::error::ForwardError;
use crate::index_resolver::IndexTarget;

/// 📮 Submits documents under a fixed document type.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    index_type: String,
}

impl Dispatcher {
    pub fn new(index_type: impl Into<String>) -> Self {
        Self {
            index_type: index_type.into(),
        }
    }

    pub fn index_type(&self) -> &str {
        &self.index_type
    }

    /// 📡 Write `document` into `target.resolved_name`, then hang the alias if one is owed.
    pub async fn submit<S>(
        &self,
        store: &S,
        document: &Document,
        target: &IndexTarget,
    ) -> Result<(), ForwardError>
    where
        S: SearchStore + Sync + ?Sized,
    {
        store
            .write(&target.resolved_name, &self.index_type, document)
            .await
            .map_err(|source| ForwardError::Submission {
                index: target.resolved_name.clone(),
                source,
            })?;
        trace!("✅ Document written to '{}'", target.resolved_name);

        if target.needs_alias() {
            if let Err(source) = store
                .add_alias(&target.resolved_name, &target.alias_name)
                .await
            {
                let the_alias_error = ForwardError::Alias {
                    index: target.resolved_name.clone(),
                    alias: target.alias_name.clone(),
                    source,
                };
                // -- ⚠️ the document is in. only the shortcut to it is missing.
                warn!("⚠️ {:#}", anyhow::Error::from(the_alias_error));
            }
        }
        Ok(())
    }
}
