use shared::{Handle, InvalidHandle, PopCount};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    accumulator::LocalAccumulator,
    api::{ApiError, PopApi},
    sound::{Silent, Sound},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClaimState {
    Idle,
    Accumulating { pops: u64 },
    Claiming { pops: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClaimOutcome {
    pub pops: u64,
    pub total: u64,
    /// The server had already applied this claim.
    pub duplicate: bool,
}

#[derive(Error, Debug)]
pub enum ClaimError {
    #[error("No local pops to submit!")]
    NothingToClaim,

    #[error("A handle is needed to save your score to the leaderboard")]
    HandleRequired,

    #[error("Invalid X handle. Please use only letters, numbers, and underscores (1-15 characters).")]
    InvalidHandle(#[from] InvalidHandle),

    #[error("Too many local pops to submit at once ({0})")]
    TooManyPops(u64),

    #[error("Failed to register handle: {0}")]
    Registration(#[source] ApiError),

    #[error("Failed to submit pops: {0}")]
    Submit(#[source] ApiError),
}

/// One visit: a handle (maybe), the local pops, and the last known total.
pub struct Session<A> {
    api: A,
    sound: Box<dyn Sound>,
    handle: Option<Handle>,
    accumulator: LocalAccumulator,
    total: u64,
    claiming: bool,
    claim_ids: bool,
    pending_claim: Option<(u64, Uuid)>,
}

impl<A: PopApi> Session<A> {
    pub fn new(api: A, handle: Option<Handle>) -> Self {
        Self {
            api,
            sound: Box::new(Silent),
            handle,
            accumulator: LocalAccumulator::new(),
            total: 0,
            claiming: false,
            claim_ids: true,
            pending_claim: None,
        }
    }

    /// Starts a session with zero local pops and, for a known handle, its
    /// current total.
    pub async fn open(api: A, handle: Option<Handle>) -> Result<Self, ApiError> {
        let mut session = Self::new(api, handle);

        if session.handle.is_some() {
            session.refresh_total().await?;
        }

        Ok(session)
    }

    pub fn with_sound(mut self, sound: impl Sound + 'static) -> Self {
        self.sound = Box::new(sound);
        self
    }

    /// Claims go out without an id, so a retry after a lost response can be
    /// counted twice.
    pub fn without_claim_ids(mut self) -> Self {
        self.claim_ids = false;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn handle(&self) -> Option<&Handle> {
        self.handle.as_ref()
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn pops(&self) -> u64 {
        self.accumulator.pops()
    }

    /// `Claiming` is also reported after a claim future was dropped midway,
    /// since its result is unknown.
    pub fn state(&self) -> ClaimState {
        let pops = self.accumulator.pops();

        match (self.claiming, pops) {
            (true, pops) => ClaimState::Claiming { pops },
            (false, 0) => ClaimState::Idle,
            (false, pops) => ClaimState::Accumulating { pops },
        }
    }

    pub fn pop(&mut self) -> u64 {
        self.claiming = false;

        let _ = self.sound.play();

        self.accumulator.pop()
    }

    pub async fn refresh_total(&mut self) -> Result<u64, ApiError> {
        if let Some(handle) = &self.handle {
            self.total = self.api.total(handle).await?;
        }

        Ok(self.total)
    }

    /// Validates and registers a handle, then loads its total.
    pub async fn register(&mut self, raw: &str) -> Result<Handle, ClaimError> {
        let handle = Handle::parse(raw)?;

        self.api
            .register(&handle)
            .await
            .map_err(ClaimError::Registration)?;
        info!("Registered handle {handle}");

        self.handle = Some(handle.clone());
        if let Err(e) = self.refresh_total().await {
            warn!("Could not load total after registering: {e}");
        }

        Ok(handle)
    }

    /// Sends every local pop to the leaderboard in one request.
    ///
    /// `entered_handle` is only used when the session has no handle yet. On
    /// any error the local pops are left as they were.
    pub async fn claim(&mut self, entered_handle: Option<&str>) -> Result<ClaimOutcome, ClaimError> {
        self.claiming = true;
        let result = self.try_claim(entered_handle).await;
        self.claiming = false;

        result
    }

    async fn try_claim(&mut self, entered_handle: Option<&str>) -> Result<ClaimOutcome, ClaimError> {
        let pops = self.accumulator.pops();
        if pops == 0 {
            return Err(ClaimError::NothingToClaim);
        }
        let count = PopCount::new(pops).map_err(|_| ClaimError::TooManyPops(pops))?;

        let handle = match self.handle.clone() {
            Some(handle) => handle,
            None => {
                let raw = entered_handle.ok_or(ClaimError::HandleRequired)?;
                let handle = Handle::parse(raw)?;

                self.api
                    .register(&handle)
                    .await
                    .map_err(ClaimError::Registration)?;
                info!("Registered handle {handle}");

                self.handle = Some(handle.clone());
                handle
            }
        };

        let claim_id = self.claim_id(pops);
        debug!("Claiming {pops} pops for {handle} with claim id {claim_id:?}");

        let response = self
            .api
            .submit(&handle, count, claim_id)
            .await
            .map_err(ClaimError::Submit)?;

        self.accumulator.reset();
        self.pending_claim = None;
        self.total = response.total;

        Ok(ClaimOutcome {
            pops,
            total: response.total,
            duplicate: response.duplicate,
        })
    }

    /// Same id for a retry of the same amount, a fresh one once it changed.
    fn claim_id(&mut self, pops: u64) -> Option<Uuid> {
        if !self.claim_ids {
            return None;
        }

        match self.pending_claim {
            Some((pending_pops, id)) if pending_pops == pops => Some(id),
            _ => {
                let id = Uuid::new_v4();
                self.pending_claim = Some((pops, id));
                Some(id)
            }
        }
    }
}
