use crate::infra::InMemoryRewardStore;
use chrono::{Local, NaiveDate};
use clap::Args;
use karma_rewards::config::{AppConfig, RewardDataConfig};
use karma_rewards::error::AppError;
use karma_rewards::rewards::validation::parse_date;
use karma_rewards::rewards::{
    load_reward_data, DailyMetrics, LoadedRewardData, RewardEngine, RewardRequest, RewardService,
    SurpriseBoxResponse,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Overrides for the reward data locations configured through the environment.
#[derive(Args, Debug, Default, Clone)]
pub(crate) struct DataArgs {
    /// Engine configuration JSON (overrides REWARD_CONFIG_PATH)
    #[arg(long)]
    pub(crate) reward_config: Option<PathBuf>,
    /// Feature condition catalogue CSV (overrides REWARD_CONDITIONS_PATH)
    #[arg(long)]
    pub(crate) conditions: Option<PathBuf>,
    /// Scorer weights JSON (overrides REWARD_SCORER_PATH)
    #[arg(long)]
    pub(crate) scorer: Option<PathBuf>,
}

impl DataArgs {
    pub(crate) fn apply(&self, paths: &mut RewardDataConfig) {
        if let Some(path) = &self.reward_config {
            paths.engine_config_path = path.clone();
        }
        if let Some(path) = &self.conditions {
            paths.conditions_path = path.clone();
        }
        if let Some(path) = &self.scorer {
            paths.scorer_path = path.clone();
        }
    }

    fn load(&self) -> Result<LoadedRewardData, AppError> {
        let mut paths = AppConfig::load()?.rewards;
        self.apply(&mut paths);
        Ok(load_reward_data(&paths)?)
    }
}

#[derive(Args, Debug)]
pub(crate) struct CheckArgs {
    /// User to evaluate
    #[arg(long)]
    pub(crate) user_id: String,
    /// Activity date (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: Option<NaiveDate>,
    #[arg(long, default_value_t = 0)]
    pub(crate) login_streak: u32,
    #[arg(long, default_value_t = 0)]
    pub(crate) posts_created: u32,
    #[arg(long, default_value_t = 0)]
    pub(crate) comments_written: u32,
    #[arg(long, default_value_t = 0)]
    pub(crate) upvotes_received: u32,
    #[arg(long, default_value_t = 0)]
    pub(crate) quizzes_completed: u32,
    #[arg(long, default_value_t = 0)]
    pub(crate) buddies_messaged: u32,
    #[arg(long, default_value_t = 0)]
    pub(crate) karma_spent: u32,
    #[arg(long, default_value_t = 0)]
    pub(crate) karma_earned_today: u32,
    #[command(flatten)]
    pub(crate) data: DataArgs,
}

impl CheckArgs {
    pub(crate) fn metrics(&self) -> DailyMetrics {
        DailyMetrics {
            login_streak: self.login_streak,
            posts_created: self.posts_created,
            comments_written: self.comments_written,
            upvotes_received: self.upvotes_received,
            quizzes_completed: self.quizzes_completed,
            buddies_messaged: self.buddies_messaged,
            karma_spent: self.karma_spent,
            karma_earned_today: self.karma_earned_today,
        }
    }
}

pub(crate) async fn run_check(args: CheckArgs) -> Result<(), AppError> {
    let loaded = args.data.load()?;
    let today = Local::now().date_naive();
    let (response, warnings) = decide(&args, loaded.engine, today).await?;

    for warning in warnings {
        eprintln!("warning: {warning}");
    }
    let rendered = serde_json::to_string_pretty(&response).map_err(std::io::Error::from)?;
    println!("{rendered}");
    Ok(())
}

/// Decide against a throwaway ledger; the one-shot check never records grants.
async fn decide(
    args: &CheckArgs,
    engine: RewardEngine,
    today: NaiveDate,
) -> Result<(SurpriseBoxResponse, Vec<String>), AppError> {
    let service = RewardService::new(
        Arc::new(engine),
        Arc::new(InMemoryRewardStore::default()),
    );
    let request = RewardRequest {
        user_id: args.user_id.clone(),
        date: args.date.unwrap_or(today).to_string(),
        daily_metrics: args.metrics(),
    };

    let decision = service.check(&request, today).await?;
    Ok((SurpriseBoxResponse::from(&decision), decision.warnings))
}

pub(crate) fn run_validate(args: DataArgs) -> Result<(), AppError> {
    let loaded = args.load()?;
    for line in summary_lines(&loaded) {
        println!("{line}");
    }
    Ok(())
}

fn summary_lines(loaded: &LoadedRewardData) -> Vec<String> {
    let config = loaded.engine.config();
    let mut lines = vec![
        "Reward data is valid".to_string(),
        format!(
            "- {} reward rules across {} box types",
            loaded.engine.rules().iter().count(),
            config.box_types.len()
        ),
        format!(
            "- {} feature conditions",
            loaded.engine.feature_conditions().len()
        ),
        format!(
            "- probability threshold {:.2} | karma {}..={}",
            config.reward_probability_threshold, config.karma_min, config.karma_max
        ),
        format!(
            "- scorer model {} (last updated {})",
            loaded.model.version,
            loaded.model.last_updated.as_deref().unwrap_or("unknown")
        ),
    ];
    for box_type in config.zero_weight_box_types() {
        lines.push(format!(
            "- warning: box type '{box_type}' has all-zero rarity weights and always yields common"
        ));
    }
    lines
}
