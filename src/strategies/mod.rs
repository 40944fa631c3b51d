pub mod deploy;
pub mod portfolio;

pub use deploy::{deploy_form, deploy_strategy, DeployForm};
pub use portfolio::{
    edit_deployment, enrich, find_deployment, load_portfolio, remove_deployment, PortfolioEntry,
};
