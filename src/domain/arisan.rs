//! The arisan state machine.
//!
//! An [`Arisan`] is one rotating-contribution group. Participants join
//! while it is open, each pays exactly the configured amount once per
//! round, and the organizer asks the randomness gateway for a draw. The
//! draw completes only when the gateway answers the exact request the
//! arisan issued; at that point the whole pot goes to the winner.
//!
//! ```text
//!   Open ──close()──▶ Closed          (status, one-way)
//!
//!   Idle ──request_winner()──▶ AwaitingRandomness
//!        ◀──fulfill_random_words()──                (draw, per round)
//! ```
//!
//! The two axes are independent: a draw may be requested or fulfilled
//! in either status. Every operation validates first and mutates only
//! after all checks pass, so a failed call leaves the arisan untouched.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Amount, ArisanId, Identity};
use crate::error::GatewayError;
use crate::randomness::{RandomWord, RandomnessConfig, RandomnessGateway, RandomnessRequest, RequestId};

/// Whether the arisan still admits participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArisanStatus {
    /// Accepting new participants.
    Open,
    /// No longer accepting participants.
    Closed,
}

impl ArisanStatus {
    /// Numeric status code (`0` open, `1` closed).
    #[must_use]
    pub const fn as_index(self) -> u8 {
        match self {
            Self::Open => 0,
            Self::Closed => 1,
        }
    }
}

/// An outstanding randomness request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawRequest {
    /// Handle returned by the gateway.
    pub request_id: RequestId,
    /// Participants eligible for this draw, in join order.
    pub roster: Vec<Identity>,
    /// When the request was issued.
    pub requested_at: DateTime<Utc>,
}

/// Result of a completed draw: who won and how much was disbursed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Payout {
    /// Arisan the pot came from.
    pub arisan_id: ArisanId,
    /// Round number that just completed (1-based).
    pub round: u64,
    /// Request whose randomness decided the draw.
    pub request_id: RequestId,
    /// Position of the winner in the draw roster.
    pub winner_index: usize,
    /// Size of the draw roster.
    pub participant_count: usize,
    /// Winning participant.
    pub winner: Identity,
    /// Disbursed pot.
    pub amount: Amount,
}

/// One rotating-contribution group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arisan {
    id: ArisanId,
    organizer: Identity,
    status: ArisanStatus,
    payment_amount: Amount,
    max_participants: u32,
    participants: Vec<Identity>,
    paid: BTreeSet<Identity>,
    pot: Amount,
    randomness: RandomnessConfig,
    active_request: Option<DrawRequest>,
    winner_history: Vec<Identity>,
    rounds_completed: u64,
}

impl Arisan {
    /// Creates an open, empty arisan owned by `organizer`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidConfiguration`] if the payment
    /// amount or participant cap is zero, or the randomness coordinates
    /// are invalid.
    pub fn new(
        id: ArisanId,
        organizer: Identity,
        randomness: RandomnessConfig,
        payment_amount: Amount,
        max_participants: u32,
    ) -> Result<Self, GatewayError> {
        if payment_amount.is_zero() {
            return Err(GatewayError::InvalidConfiguration(
                "payment amount must be greater than zero".to_string(),
            ));
        }
        if max_participants == 0 {
            return Err(GatewayError::InvalidConfiguration(
                "max participants must be greater than zero".to_string(),
            ));
        }
        randomness.validate()?;

        Ok(Self {
            id,
            organizer,
            status: ArisanStatus::Open,
            payment_amount,
            max_participants,
            participants: Vec::new(),
            paid: BTreeSet::new(),
            pot: Amount::ZERO,
            randomness,
            active_request: None,
            winner_history: Vec::new(),
            rounds_completed: 0,
        })
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Registry identifier.
    #[must_use]
    pub const fn id(&self) -> ArisanId {
        self.id
    }

    /// Creator and sole administrator.
    #[must_use]
    pub const fn organizer(&self) -> &Identity {
        &self.organizer
    }

    /// Returns `true` if `caller` is the organizer.
    #[must_use]
    pub fn is_organizer(&self, caller: &Identity) -> bool {
        &self.organizer == caller
    }

    /// Current status.
    #[must_use]
    pub const fn status(&self) -> ArisanStatus {
        self.status
    }

    /// Required contribution per participant per round.
    #[must_use]
    pub const fn payment_amount(&self) -> Amount {
        self.payment_amount
    }

    /// Participant cap.
    #[must_use]
    pub const fn max_participants(&self) -> u32 {
        self.max_participants
    }

    /// Participants in join order.
    #[must_use]
    pub fn participants(&self) -> &[Identity] {
        &self.participants
    }

    /// Number of participants.
    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Returns `true` if `identity` has joined.
    #[must_use]
    pub fn is_participant(&self, identity: &Identity) -> bool {
        self.participants.contains(identity)
    }

    /// Returns `true` if `identity` paid for the current round.
    #[must_use]
    pub fn has_paid(&self, identity: &Identity) -> bool {
        self.paid.contains(identity)
    }

    /// Undisbursed contributions of the current round.
    #[must_use]
    pub const fn pot(&self) -> Amount {
        self.pot
    }

    /// Past winners, oldest first.
    #[must_use]
    pub fn winner_history(&self) -> &[Identity] {
        &self.winner_history
    }

    /// Number of completed rounds.
    #[must_use]
    pub const fn rounds_completed(&self) -> u64 {
        self.rounds_completed
    }

    /// Randomness coordinates used for draws.
    #[must_use]
    pub const fn randomness(&self) -> &RandomnessConfig {
        &self.randomness
    }

    /// The outstanding randomness request, if any.
    #[must_use]
    pub const fn active_request(&self) -> Option<&DrawRequest> {
        self.active_request.as_ref()
    }

    // ── Mutations ───────────────────────────────────────────────────────

    /// Adds `caller` to the participants, returning the new count.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Closed`] if the arisan is closed,
    /// [`GatewayError::Full`] if the cap is reached,
    /// [`GatewayError::AlreadyJoined`] if `caller` is already in.
    pub fn join(&mut self, caller: &Identity) -> Result<usize, GatewayError> {
        if self.status == ArisanStatus::Closed {
            return Err(GatewayError::Closed(self.id));
        }
        if self.participants.len() >= self.max_participants as usize {
            return Err(GatewayError::Full {
                arisan_id: self.id,
                max_participants: self.max_participants,
            });
        }
        if self.is_participant(caller) {
            return Err(GatewayError::AlreadyJoined(self.id));
        }

        self.participants.push(caller.clone());
        Ok(self.participants.len())
    }

    /// Records `caller`'s contribution for the current round, returning
    /// the new pot.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NotAParticipant`] if `caller` has not joined,
    /// [`GatewayError::InvalidPaymentAmount`] unless `amount` equals the
    /// payment amount exactly, [`GatewayError::AlreadyPaid`] on a second
    /// payment in the same round.
    pub fn pay(&mut self, caller: &Identity, amount: Amount) -> Result<Amount, GatewayError> {
        if !self.is_participant(caller) {
            return Err(GatewayError::NotAParticipant(self.id));
        }
        if amount != self.payment_amount {
            return Err(GatewayError::InvalidPaymentAmount {
                expected: self.payment_amount,
                actual: amount,
            });
        }
        if self.has_paid(caller) {
            return Err(GatewayError::AlreadyPaid(self.id));
        }
        let pot = self
            .pot
            .checked_add(amount)
            .ok_or_else(|| GatewayError::Internal(format!("pot overflow in arisan {}", self.id)))?;

        self.pot = pot;
        self.paid.insert(caller.clone());
        Ok(pot)
    }

    /// Closes the arisan to new participants. Closing twice is a no-op.
    ///
    /// Returns `true` if the status changed.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Unauthorized`] unless `caller` is the organizer.
    pub fn close(&mut self, caller: &Identity) -> Result<bool, GatewayError> {
        if !self.is_organizer(caller) {
            return Err(GatewayError::Unauthorized(self.id));
        }
        let changed = self.status == ArisanStatus::Open;
        self.status = ArisanStatus::Closed;
        Ok(changed)
    }

    /// Asks `gateway` for randomness to pick this round's winner.
    ///
    /// Returns as soon as the gateway accepts the request; the winner is
    /// chosen later in [`Arisan::fulfill_random_words`]. The current
    /// participants are frozen as the draw roster.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Unauthorized`] unless `caller` is the organizer,
    /// [`GatewayError::RequestAlreadyInFlight`] while a request is
    /// outstanding, [`GatewayError::NoParticipants`] if nobody joined,
    /// or any error the gateway returns.
    pub fn request_winner(
        &mut self,
        caller: &Identity,
        gateway: &dyn RandomnessGateway,
    ) -> Result<RequestId, GatewayError> {
        if !self.is_organizer(caller) {
            return Err(GatewayError::Unauthorized(self.id));
        }
        if let Some(active) = &self.active_request {
            return Err(GatewayError::RequestAlreadyInFlight {
                arisan_id: self.id,
                request_id: active.request_id,
            });
        }
        if self.participants.is_empty() {
            return Err(GatewayError::NoParticipants(self.id));
        }

        let request_id =
            gateway.request_random_words(RandomnessRequest::for_consumer(self.id, &self.randomness))?;
        self.active_request = Some(DrawRequest {
            request_id,
            roster: self.participants.clone(),
            requested_at: Utc::now(),
        });
        Ok(request_id)
    }

    /// Completes the outstanding draw with words delivered by the gateway.
    ///
    /// The winner is `roster[words[0] mod roster.len()]`. The full pot is
    /// returned as a [`Payout`]; the pot and paid flags reset for the next
    /// round. This is the only place the pot leaves the arisan.
    ///
    /// # Errors
    ///
    /// [`GatewayError::UnknownRandomnessRequest`] if no request is
    /// outstanding or `request_id` is not the outstanding one,
    /// [`GatewayError::EmptyRandomWords`] if `words` is empty. Either way
    /// nothing changes.
    pub fn fulfill_random_words(
        &mut self,
        request_id: RequestId,
        words: &[RandomWord],
    ) -> Result<Payout, GatewayError> {
        let draw = match &self.active_request {
            Some(draw) if draw.request_id == request_id => draw,
            _ => {
                return Err(GatewayError::UnknownRandomnessRequest {
                    arisan_id: self.id,
                    request_id,
                });
            }
        };
        let word = words
            .first()
            .ok_or(GatewayError::EmptyRandomWords(request_id))?;

        let participant_count = draw.roster.len();
        let winner_index = word.reduce(participant_count).ok_or_else(|| {
            GatewayError::Internal(format!("empty draw roster in arisan {}", self.id))
        })?;
        let winner = draw.roster.get(winner_index).cloned().ok_or_else(|| {
            GatewayError::Internal(format!("winner index out of range in arisan {}", self.id))
        })?;

        Ok(self.settle(request_id, winner_index, participant_count, winner))
    }

    /// Replays a draw that completed in an earlier process but is still
    /// outstanding in this arisan's restored state.
    ///
    /// Applies the same reset as [`Arisan::fulfill_random_words`] without
    /// random words: the recorded payout names the winner directly.
    ///
    /// # Errors
    ///
    /// [`GatewayError::UnknownRandomnessRequest`] if `payout` does not
    /// belong to this arisan's outstanding request, or
    /// [`GatewayError::Internal`] if the recorded winner, roster size or
    /// amount disagree with the restored draw. Nothing changes on error.
    pub fn apply_recorded_payout(&mut self, payout: &Payout) -> Result<(), GatewayError> {
        let draw = match &self.active_request {
            Some(draw) if payout.arisan_id == self.id && draw.request_id == payout.request_id => {
                draw
            }
            _ => {
                return Err(GatewayError::UnknownRandomnessRequest {
                    arisan_id: self.id,
                    request_id: payout.request_id,
                });
            }
        };
        if draw.roster.len() != payout.participant_count
            || draw.roster.get(payout.winner_index) != Some(&payout.winner)
        {
            return Err(GatewayError::Internal(format!(
                "recorded winner of request {} does not match the roster of arisan {}",
                payout.request_id, self.id
            )));
        }
        if self.pot != payout.amount {
            return Err(GatewayError::Internal(format!(
                "recorded payout {} differs from the pot {} of arisan {}",
                payout.amount, self.pot, self.id
            )));
        }

        let _ = self.settle(
            payout.request_id,
            payout.winner_index,
            payout.participant_count,
            payout.winner.clone(),
        );
        Ok(())
    }

    fn settle(
        &mut self,
        request_id: RequestId,
        winner_index: usize,
        participant_count: usize,
        winner: Identity,
    ) -> Payout {
        let amount = self.pot;
        self.pot = Amount::ZERO;
        self.paid.clear();
        self.active_request = None;
        self.winner_history.push(winner.clone());
        self.rounds_completed = self.rounds_completed.saturating_add(1);

        Payout {
            arisan_id: self.id,
            round: self.rounds_completed,
            request_id,
            winner_index,
            participant_count,
            winner,
            amount,
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::randomness::{LocalVrfCoordinator, SubscriptionId};

    fn ident(name: &str) -> Identity {
        let Ok(id) = Identity::parse(name) else {
            panic!("valid identity {name}");
        };
        id
    }

    fn ether(s: &str) -> Amount {
        let Ok(a) = Amount::parse_ether(s) else {
            panic!("valid amount {s}");
        };
        a
    }

    fn randomness() -> RandomnessConfig {
        RandomnessConfig {
            coordinator: "local".to_string(),
            key_hash: format!("0x{}", "47".repeat(32)),
            subscription_id: SubscriptionId::new(1),
            callback_gas_limit: 500_000,
            request_confirmations: 3,
            num_words: 1,
        }
    }

    fn arisan(max: u32) -> Arisan {
        let Ok(a) = Arisan::new(ArisanId::new(0), ident("hasnan"), randomness(), ether("0.02"), max)
        else {
            panic!("valid arisan");
        };
        a
    }

    fn gateway() -> LocalVrfCoordinator {
        let (coordinator, _rx) = LocalVrfCoordinator::new(Amount::from_wei(1), [1u8; 32]);
        if coordinator.ensure_subscription(SubscriptionId::new(1)).is_err()
            || coordinator
                .fund_subscription(SubscriptionId::new(1), ether("2"))
                .is_err()
            || coordinator
                .add_consumer(SubscriptionId::new(1), &ident("hasnan"), ArisanId::new(0))
                .is_err()
        {
            panic!("coordinator setup failed");
        }
        coordinator
    }

    #[test]
    fn new_arisan_reports_its_configuration() {
        let a = arisan(2);
        assert_eq!(a.payment_amount().to_ether_string(), "0.02");
        assert_eq!(a.max_participants(), 2);
        assert_eq!(a.participant_count(), 0);
        assert_eq!(a.status(), ArisanStatus::Open);
        assert_eq!(a.pot(), Amount::ZERO);
        assert_eq!(a.organizer(), &ident("hasnan"));
        assert!(a.active_request().is_none());
    }

    #[test]
    fn zero_payment_or_capacity_is_invalid() {
        let zero_pay = Arisan::new(ArisanId::new(0), ident("o"), randomness(), Amount::ZERO, 2);
        assert!(matches!(zero_pay, Err(GatewayError::InvalidConfiguration(_))));

        let zero_cap = Arisan::new(ArisanId::new(0), ident("o"), randomness(), ether("1"), 0);
        assert!(matches!(zero_cap, Err(GatewayError::InvalidConfiguration(_))));
    }

    #[test]
    fn joining_twice_fails() {
        let mut a = arisan(2);
        assert_eq!(a.join(&ident("alice")).ok(), Some(1));
        assert!(matches!(
            a.join(&ident("alice")),
            Err(GatewayError::AlreadyJoined(_))
        ));
        assert_eq!(a.participant_count(), 1);
        assert_eq!(a.participants().first(), Some(&ident("alice")));
    }

    #[test]
    fn joining_a_full_arisan_fails() {
        let mut a = arisan(2);
        assert!(a.join(&ident("alice")).is_ok());
        assert!(a.join(&ident("bob")).is_ok());
        assert!(matches!(a.join(&ident("carol")), Err(GatewayError::Full { .. })));
        // Full takes precedence over AlreadyJoined.
        assert!(matches!(a.join(&ident("alice")), Err(GatewayError::Full { .. })));
    }

    #[test]
    fn joining_a_closed_arisan_fails() {
        let mut a = arisan(3);
        assert!(a.join(&ident("alice")).is_ok());
        assert_eq!(a.close(&ident("hasnan")).ok(), Some(true));
        assert!(matches!(a.join(&ident("dave")), Err(GatewayError::Closed(_))));
        // Existing participants are untouched.
        assert_eq!(a.participant_count(), 1);
    }

    #[test]
    fn close_is_organizer_only_and_idempotent() {
        let mut a = arisan(2);
        assert!(matches!(
            a.close(&ident("alice")),
            Err(GatewayError::Unauthorized(_))
        ));
        assert_eq!(a.status(), ArisanStatus::Open);
        assert_eq!(a.close(&ident("hasnan")).ok(), Some(true));
        assert_eq!(a.close(&ident("hasnan")).ok(), Some(false));
        assert_eq!(a.status(), ArisanStatus::Closed);
        assert_eq!(a.status().as_index(), 1);
    }

    #[test]
    fn paying_twice_in_a_round_fails() {
        let mut a = arisan(2);
        let alice = ident("alice");
        assert!(a.join(&alice).is_ok());
        assert_eq!(a.pay(&alice, ether("0.02")).ok(), Some(ether("0.02")));
        assert!(a.has_paid(&alice));
        assert!(matches!(
            a.pay(&alice, ether("0.02")),
            Err(GatewayError::AlreadyPaid(_))
        ));
        assert_eq!(a.pot(), ether("0.02"));
    }

    #[test]
    fn paying_the_wrong_amount_fails() {
        let mut a = arisan(2);
        let alice = ident("alice");
        assert!(a.join(&alice).is_ok());
        for wrong in ["0", "0.01", "0.03", "1"] {
            assert!(matches!(
                a.pay(&alice, ether(wrong)),
                Err(GatewayError::InvalidPaymentAmount { .. })
            ));
        }
        assert_eq!(a.pot(), Amount::ZERO);
        assert!(!a.has_paid(&alice));
    }

    #[test]
    fn paying_without_joining_fails() {
        let mut a = arisan(2);
        assert!(matches!(
            a.pay(&ident("alice"), ether("0.02")),
            Err(GatewayError::NotAParticipant(_))
        ));
        // Membership is checked before the amount.
        assert!(matches!(
            a.pay(&ident("alice"), ether("0.01")),
            Err(GatewayError::NotAParticipant(_))
        ));
    }

    #[test]
    fn request_winner_guards() {
        let gw = gateway();
        let mut a = arisan(2);
        assert!(matches!(
            a.request_winner(&ident("hasnan"), &gw),
            Err(GatewayError::NoParticipants(_))
        ));
        assert!(a.join(&ident("alice")).is_ok());
        assert!(matches!(
            a.request_winner(&ident("alice"), &gw),
            Err(GatewayError::Unauthorized(_))
        ));

        let Ok(first) = a.request_winner(&ident("hasnan"), &gw) else {
            panic!("request rejected");
        };
        assert_eq!(a.active_request().map(|d| d.request_id), Some(first));
        assert!(matches!(
            a.request_winner(&ident("hasnan"), &gw),
            Err(GatewayError::RequestAlreadyInFlight { .. })
        ));
    }

    #[test]
    fn full_round_picks_a_participant_and_empties_the_pot() {
        let gw = gateway();
        let mut a = arisan(2);
        let (alice, bob) = (ident("alice"), ident("bob"));
        for p in [&alice, &bob] {
            assert!(a.join(p).is_ok());
            assert!(a.pay(p, ether("0.02")).is_ok());
        }
        assert_eq!(a.pot(), ether("0.04"));

        let Ok(request_id) = a.request_winner(&ident("hasnan"), &gw) else {
            panic!("request rejected");
        };
        let Ok(fulfillment) = gw.fulfill(request_id) else {
            panic!("fulfillment failed");
        };
        let Ok(payout) = a.fulfill_random_words(request_id, &fulfillment.random_words) else {
            panic!("draw rejected");
        };

        assert!(payout.winner == alice || payout.winner == bob);
        assert_eq!(payout.amount, ether("0.04"));
        assert_eq!(payout.round, 1);
        assert_eq!(a.pot(), Amount::ZERO);
        assert_eq!(a.winner_history(), &[payout.winner.clone()]);
        assert!(!a.has_paid(&alice) && !a.has_paid(&bob));
        assert!(a.active_request().is_none());

        // Next round starts fresh.
        assert!(a.pay(&alice, ether("0.02")).is_ok());
    }

    #[test]
    fn recorded_payout_settles_a_restored_draw() {
        let gw = gateway();
        let mut live = arisan(2);
        for p in ["alice", "bob"] {
            assert!(live.join(&ident(p)).is_ok());
            assert!(live.pay(&ident(p), ether("0.02")).is_ok());
        }
        let Ok(request_id) = live.request_winner(&ident("hasnan"), &gw) else {
            panic!("request rejected");
        };
        let mut stale = live.clone();
        let Ok(payout) = live.fulfill_random_words(request_id, &[RandomWord::from_u128(1)]) else {
            panic!("draw rejected");
        };

        let mut tampered = payout.clone();
        tampered.amount = ether("1");
        assert!(matches!(
            stale.apply_recorded_payout(&tampered),
            Err(GatewayError::Internal(_))
        ));
        let mut foreign = payout.clone();
        foreign.request_id = RequestId::new(99);
        assert!(matches!(
            stale.apply_recorded_payout(&foreign),
            Err(GatewayError::UnknownRandomnessRequest { .. })
        ));
        assert_eq!(stale.pot(), ether("0.04"));

        assert!(stale.apply_recorded_payout(&payout).is_ok());
        assert_eq!(stale, live);
        assert!(stale.apply_recorded_payout(&payout).is_err());
    }

    #[test]
    fn winner_index_is_word_mod_roster() {
        let gw = gateway();
        let mut a = arisan(3);
        for p in ["alice", "bob", "carol"] {
            assert!(a.join(&ident(p)).is_ok());
        }
        let Ok(id) = a.request_winner(&ident("hasnan"), &gw) else {
            panic!("request rejected");
        };
        let Ok(payout) = a.fulfill_random_words(id, &[RandomWord::from_u128(5)]) else {
            panic!("draw rejected");
        };
        assert_eq!(payout.winner_index, 2);
        assert_eq!(payout.winner, ident("carol"));
    }

    #[test]
    fn mismatched_fulfillment_changes_nothing() {
        let gw = gateway();
        let mut a = arisan(2);
        let alice = ident("alice");
        assert!(a.join(&alice).is_ok());
        assert!(a.pay(&alice, ether("0.02")).is_ok());

        // Nothing outstanding yet.
        let unsolicited = a.fulfill_random_words(RequestId::new(1), &[RandomWord::from_u128(0)]);
        assert!(matches!(
            unsolicited,
            Err(GatewayError::UnknownRandomnessRequest { .. })
        ));

        let Ok(id) = a.request_winner(&ident("hasnan"), &gw) else {
            panic!("request rejected");
        };
        let before = a.clone();
        let stale = a.fulfill_random_words(
            RequestId::new(id.get() + 1),
            &[RandomWord::from_u128(0)],
        );
        assert!(matches!(
            stale,
            Err(GatewayError::UnknownRandomnessRequest { .. })
        ));
        assert!(matches!(
            a.fulfill_random_words(id, &[]),
            Err(GatewayError::EmptyRandomWords(_))
        ));
        assert_eq!(a, before);
    }

    #[test]
    fn late_joiners_are_not_in_the_current_draw() {
        let gw = gateway();
        let mut a = arisan(3);
        assert!(a.join(&ident("alice")).is_ok());
        let Ok(id) = a.request_winner(&ident("hasnan"), &gw) else {
            panic!("request rejected");
        };
        assert!(a.join(&ident("bob")).is_ok());
        // Index 1 would be bob in the live list; the frozen roster has one entry.
        let Ok(payout) = a.fulfill_random_words(id, &[RandomWord::from_u128(1)]) else {
            panic!("draw rejected");
        };
        assert_eq!(payout.winner, ident("alice"));
        assert_eq!(payout.participant_count, 1);
    }

    #[test]
    fn participants_never_exceed_capacity_under_random_joins() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..50 {
            let cap = rng.gen_range(1..6u32);
            let mut a = arisan(cap);
            for _ in 0..40 {
                let who = ident(&format!("p{}", rng.gen_range(0..10u32)));
                match rng.gen_range(0..10u32) {
                    0 => {
                        let _ = a.close(&ident("hasnan"));
                    }
                    _ => {
                        let _ = a.join(&who);
                    }
                }
                assert!(a.participant_count() <= cap as usize);
                let unique: BTreeSet<_> = a.participants().iter().collect();
                assert_eq!(unique.len(), a.participant_count());
            }
        }
    }

    #[test]
    fn pot_always_matches_paid_participants() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut a = arisan(5);
        for i in 0..5 {
            assert!(a.join(&ident(&format!("p{i}"))).is_ok());
        }
        for _ in 0..100 {
            let who = ident(&format!("p{}", rng.gen_range(0..6u32)));
            let amount = if rng.gen_bool(0.7) {
                ether("0.02")
            } else {
                ether("0.01")
            };
            let _ = a.pay(&who, amount);
            let paid = a.participants().iter().filter(|p| a.has_paid(p)).count() as u128;
            assert_eq!(a.pot().wei(), a.payment_amount().wei() * paid);
        }
    }

    #[test]
    fn snapshot_round_trip_preserves_state() {
        let mut a = arisan(2);
        assert!(a.join(&ident("alice")).is_ok());
        assert!(a.pay(&ident("alice"), ether("0.02")).is_ok());
        let Ok(json) = serde_json::to_value(&a) else {
            panic!("serialization failed");
        };
        assert_eq!(json.get("status"), Some(&serde_json::Value::from("OPEN")));
        let Ok(back) = serde_json::from_value::<Arisan>(json) else {
            panic!("deserialization failed");
        };
        assert_eq!(back, a);
    }
}
