/// Slot for one secondary result (AI suggestions, accessibility report).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentState<T> {
    pub value: Option<T>,
    pub loading: bool,
    pub error: Option<String>,
}

impl<T> Default for EnrichmentState<T> {
    fn default() -> Self {
        Self {
            value: None,
            loading: false,
            error: None,
        }
    }
}

impl<T> EnrichmentState<T> {
    /// Marks a request as outstanding. Returns `false` if one already is.
    pub fn begin(&mut self) -> bool {
        if self.loading {
            return false;
        }
        self.loading = true;
        self.error = None;
        true
    }

    pub fn succeed(&mut self, value: T) {
        self.value = Some(value);
        self.error = None;
        self.loading = false;
    }

    /// Records a failure. A value obtained earlier is kept.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.loading = false;
    }

    pub fn settle(&mut self, result: Result<T, String>) {
        match result {
            Ok(value) => self.succeed(value),
            Err(error) => self.fail(error),
        }
    }
}

/// When metrics are revealed relative to the enrichments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnrichmentPolicy {
    /// Reveal metrics at once and let enrichments stream in.
    #[default]
    RevealThenStream,
    /// Hold metrics back until every requested enrichment has settled.
    BlockUntilReady,
    /// Block for historical loads, stream for fresh runs.
    BlockHistorical,
}

impl EnrichmentPolicy {
    pub fn blocks(self, historical: bool) -> bool {
        match self {
            EnrichmentPolicy::RevealThenStream => false,
            EnrichmentPolicy::BlockUntilReady => true,
            EnrichmentPolicy::BlockHistorical => historical,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{EnrichmentPolicy, EnrichmentState};

    #[test]
    fn only_one_outstanding_request() {
        let mut slot = EnrichmentState::<u32>::default();
        assert!(slot.begin());
        assert!(!slot.begin());
        slot.succeed(7);
        assert!(!slot.loading);
        assert_eq!(slot.value, Some(7));
    }

    #[test]
    fn failure_keeps_earlier_value() {
        let mut slot = EnrichmentState::default();
        slot.begin();
        slot.succeed(vec!["a".to_string()]);
        slot.begin();
        slot.fail("provider down");
        assert_eq!(slot.value, Some(vec!["a".to_string()]));
        assert_eq!(slot.error.as_deref(), Some("provider down"));
        assert!(!slot.loading);
    }

    #[test]
    fn block_historical_only_blocks_replays() {
        assert!(EnrichmentPolicy::BlockHistorical.blocks(true));
        assert!(!EnrichmentPolicy::BlockHistorical.blocks(false));
        assert!(!EnrichmentPolicy::RevealThenStream.blocks(true));
        assert!(EnrichmentPolicy::BlockUntilReady.blocks(false));
    }
}
