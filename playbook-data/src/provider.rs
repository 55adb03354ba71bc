use crate::{error::DataError, frame::BarFrame, funding::FundingSeries, minute::MinuteStream};
use playbook_instrument::timeframe::Timeframe;

/// Collaborator contract for loading precomputed run inputs.
///
/// Completeness (no gaps, indicator columns precomputed) is a precondition of the
/// engine loop; providers are expected to have run their own preflight.
pub trait DataProvider {
    fn load_frame(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<BarFrame, DataError>;

    fn load_funding(
        &self,
        symbol: &str,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<FundingSeries, DataError>;

    fn load_minute_stream(
        &self,
        symbol: &str,
        start_ts: i64,
        end_ts: i64,
    ) -> Result<MinuteStream, DataError>;
}

/// [`DataProvider`] over frames preloaded in memory. Used by backtest harnesses and
/// tests; live providers are external collaborators.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    frames: Vec<(Timeframe, BarFrame)>,
    funding: FundingSeries,
    minutes: Option<MinuteStream>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame(mut self, timeframe: Timeframe, frame: BarFrame) -> Self {
        self.frames.push((timeframe, frame));
        self
    }

    pub fn with_funding(mut self, funding: FundingSeries) -> Self {
        self.funding = funding;
        self
    }

    pub fn with_minute_stream(mut self, minutes: MinuteStream) -> Self {
        self.minutes = Some(minutes);
        self
    }
}

impl DataProvider for InMemoryProvider {
    fn load_frame(
        &self,
        _symbol: &str,
        timeframe: Timeframe,
        _start_ts: i64,
        _end_ts: i64,
    ) -> Result<BarFrame, DataError> {
        self.frames
            .iter()
            .find(|(tf, _)| *tf == timeframe)
            .map(|(_, frame)| frame.clone())
            .ok_or(DataError::EmptySeries { timeframe })
    }

    fn load_funding(
        &self,
        _symbol: &str,
        _start_ts: i64,
        _end_ts: i64,
    ) -> Result<FundingSeries, DataError> {
        Ok(self.funding.clone())
    }

    fn load_minute_stream(
        &self,
        _symbol: &str,
        _start_ts: i64,
        _end_ts: i64,
    ) -> Result<MinuteStream, DataError> {
        self.minutes.clone().ok_or(DataError::EmptySeries {
            timeframe: Timeframe::M1,
        })
    }
}
