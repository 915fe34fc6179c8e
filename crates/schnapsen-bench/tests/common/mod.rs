use std::fmt;
use std::path::Path;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use schnapsen_bench::config::BenchmarkConfig;
use schnapsen_bench::tournament::{AgentRoster, GameOutcome, MatchEngine, Slot};
use schnapsen_bot::{Bot, PolicyError, beats, card_value};
use schnapsen_core::model::card::Card;
use schnapsen_core::model::deck::{Deck, HAND_SIZE};
use schnapsen_core::model::hand::Hand;
use schnapsen_core::model::moves::Move;
use schnapsen_core::model::perspective::PerspectiveSnapshot;
use schnapsen_core::model::rank::Rank;
use schnapsen_core::model::suit::Suit;

/// Five tricks from a five-card deal; the side with more card points wins.
pub struct TrickDuel {
    pub fail_after: Option<usize>,
    pub games: usize,
}

impl TrickDuel {
    pub fn new() -> Self {
        Self {
            fail_after: None,
            games: 0,
        }
    }
}

#[derive(Debug)]
pub struct DuelError(String);

impl fmt::Display for DuelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for DuelError {}

impl From<PolicyError> for DuelError {
    fn from(err: PolicyError) -> Self {
        DuelError(err.to_string())
    }
}

fn view(hand: &Hand, trump: Suit) -> PerspectiveSnapshot {
    let mut view = PerspectiveSnapshot::regular_moves(hand.clone(), trump);
    for suit in Suit::ALL {
        if hand.contains(Card::new(Rank::King, suit)) && hand.contains(Card::new(Rank::Queen, suit))
        {
            view = view.with_move(Move::marriage(suit));
        }
    }
    view
}

impl MatchEngine for TrickDuel {
    type Perspective = PerspectiveSnapshot;
    type Error = DuelError;

    fn play_game(
        &mut self,
        mut players: [&mut dyn Bot<PerspectiveSnapshot>; 2],
        rng: &mut StdRng,
    ) -> Result<GameOutcome, DuelError> {
        if self.fail_after == Some(self.games) {
            return Err(DuelError("table collapsed".into()));
        }
        self.games += 1;

        let mut deck = Deck::shuffled(rng);
        let trump = deck
            .bottom()
            .map(|card| card.suit)
            .ok_or_else(|| DuelError("empty deck".into()))?;
        let mut hands = [
            Hand::with_cards(deck.draw(HAND_SIZE)),
            Hand::with_cards(deck.draw(HAND_SIZE)),
        ];
        let mut points = [0u32; 2];
        let mut leader = 0usize;

        for _ in 0..HAND_SIZE {
            let follower = 1 - leader;
            let lead = players[leader].get_move(&view(&hands[leader], trump), None)?;
            let lead_card = lead.played_card();
            hands[leader].remove(lead_card);

            let answer =
                players[follower].get_move(&view(&hands[follower], trump), Some(&lead))?;
            let answer_card = answer.played_card();
            hands[follower].remove(answer_card);

            let taker = if beats(answer_card, lead_card, trump) {
                follower
            } else {
                leader
            };
            points[taker] += card_value(lead_card) + card_value(answer_card);
            leader = taker;
        }

        let winner = if points[0] >= points[1] { 0 } else { 1 };
        let margin = points[winner] - points[1 - winner];
        Ok(GameOutcome {
            winner: if winner == 0 { Slot::First } else { Slot::Second },
            game_points: if margin >= 20 { 3 } else if margin >= 10 { 2 } else { 1 },
            score: points[winner],
        })
    }
}

/// Uniform player standing in for an external opponent.
pub struct RandomBot {
    name: &'static str,
    rng: StdRng,
}

impl Bot<PerspectiveSnapshot> for RandomBot {
    fn name(&self) -> &str {
        self.name
    }

    fn get_move(
        &mut self,
        perspective: &PerspectiveSnapshot,
        _leader_move: Option<&Move>,
    ) -> Result<Move, PolicyError> {
        perspective
            .moves()
            .choose(&mut self.rng)
            .copied()
            .ok_or(PolicyError::InvalidState("no valid moves"))
    }
}

/// Two matchups against the registered `rival`, six deals each.
pub fn load_config(output_dir: &Path, seed: u64, structured: bool) -> BenchmarkConfig {
    let yaml = format!(
        r#"
run_id: "test_smoke"
series:
  seed: {seed}
  games: 6
agents:
  - name: "heuristic"
    kind: "heuristic"
  - name: "random"
    kind: "external"
  - name: "rival"
    kind: "external"
matchups:
  - id: "heuristic-rival"
    agent: "heuristic"
    opponent: "rival"
  - id: "random-rival"
    agent: "random"
    opponent: "rival"
outputs:
  jsonl: "{jsonl}"
  summary_md: "{summary}"
  plots_dir: "{plots}"
metrics:
  comparisons:
    - a: "heuristic-rival"
      b: "random-rival"
logging:
  enable_structured: {structured}
"#,
        jsonl = output_dir.join("games.jsonl").display(),
        summary = output_dir.join("summary.md").display(),
        plots = output_dir.join("plots").display()
    );

    let mut cfg: BenchmarkConfig = serde_yaml::from_str(&yaml).expect("valid yaml");
    cfg.validate().expect("config validates");
    cfg
}

pub fn roster(config: &BenchmarkConfig) -> AgentRoster<PerspectiveSnapshot> {
    let mut roster = AgentRoster::from_configs(&config.agents).expect("roster builds");
    roster
        .register("random", |seed| {
            Box::new(RandomBot {
                name: "random",
                rng: StdRng::seed_from_u64(seed),
            })
        })
        .expect("register random");
    roster
        .register("rival", |seed| {
            Box::new(RandomBot {
                name: "rival",
                rng: StdRng::seed_from_u64(seed),
            })
        })
        .expect("register rival");
    roster
}
