//! Enumeration of every calendar visible to a session.

use std::collections::HashSet;
use std::sync::Arc;

use dayboard_core::CalendarEntry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::ProviderResult;
use crate::provider::{CalendarApi, cancellable};
use crate::session::AuthorizedSession;

/// Lists calendars, following page tokens until the last page.
#[derive(Clone)]
pub struct CalendarLister {
    api: Arc<dyn CalendarApi>,
}

impl CalendarLister {
    /// Creates a lister backed by the given calendar API.
    pub fn new(api: Arc<dyn CalendarApi>) -> Self {
        Self { api }
    }

    /// Returns every accessible calendar, hidden ones included.
    ///
    /// Returns an empty list when there is no session or any page fails.
    pub async fn list_all(
        &self,
        session: Option<&AuthorizedSession>,
        cancel: &CancellationToken,
    ) -> Vec<CalendarEntry> {
        let Some(session) = session else {
            debug!("no session, skipping calendar listing");
            return Vec::new();
        };

        match self.try_list_all(session, cancel).await {
            Ok(calendars) => calendars,
            Err(e) => {
                warn!("failed to list calendars: {}", e);
                Vec::new()
            }
        }
    }

    /// Like [`list_all`](Self::list_all) but reports the failure.
    pub async fn try_list_all(
        &self,
        session: &AuthorizedSession,
        cancel: &CancellationToken,
    ) -> ProviderResult<Vec<CalendarEntry>> {
        let mut calendars = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        let mut pages = 0usize;

        loop {
            let page = cancellable(
                cancel,
                "calendar listing",
                self.api.list_calendars_page(session, page_token.as_deref()),
            )
            .await?;
            pages += 1;
            calendars.extend(page.items);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) if !seen_tokens.insert(next.clone()) => {
                    warn!("calendar list repeated page token {:?}, stopping", next);
                    break;
                }
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        debug!(pages, count = calendars.len(), "listed calendars");
        Ok(calendars)
    }
}
