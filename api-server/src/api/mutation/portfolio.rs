use super::super::{current_user, get_context, GraphQLResult};
use async_graphql::{Context, InputObject, Object, Result};
use chrono::{DateTime, Utc};
use portfolio_core::{Portfolio, Position, Transaction, TransactionSide};

#[derive(InputObject)]
pub struct PositionInput {
    pub symbol: String,
    pub company: Option<String>,
    pub shares: f64,
    pub avg_purchase_price: f64,
    pub purchase_date: Option<DateTime<Utc>>,
}

#[derive(InputObject)]
pub struct TransactionInput {
    pub symbol: String,
    pub company: Option<String>,
    pub side: TransactionSide,
    pub shares: f64,
    pub price: f64,
    pub executed_at: Option<DateTime<Utc>>,
}

#[derive(Default)]
pub struct PortfolioMutation;

#[Object]
impl PortfolioMutation {
    async fn create_portfolio<'ctx>(
        &self,
        context: &Context<'ctx>,
        name: String,
        description: Option<String>,
    ) -> Result<Portfolio> {
        let user = current_user(context)?;
        get_context(context)
            .store()
            .create_portfolio(user, &name, description.as_deref())
            .gql()
    }

    /// Rename a portfolio or change its description. An empty description
    /// clears it.
    async fn update_portfolio<'ctx>(
        &self,
        context: &Context<'ctx>,
        id: String,
        name: Option<String>,
        description: Option<String>,
    ) -> Result<Portfolio> {
        let user = current_user(context)?;
        get_context(context)
            .store()
            .update_portfolio(user, &id, name.as_deref(), description.as_deref())
            .gql()
    }

    async fn delete_portfolio<'ctx>(&self, context: &Context<'ctx>, id: String) -> Result<bool> {
        let user = current_user(context)?;
        get_context(context).store().delete_portfolio(user, &id).gql()?;
        Ok(true)
    }

    async fn add_position<'ctx>(
        &self,
        context: &Context<'ctx>,
        portfolio_id: String,
        position: PositionInput,
    ) -> Result<Portfolio> {
        let user = current_user(context)?;
        let position = Position::new(
            &position.symbol,
            position.company.as_deref().unwrap_or_default(),
            position.shares,
            position.avg_purchase_price,
            position.purchase_date,
        )
        .gql()?;
        get_context(context)
            .store()
            .add_position(user, &portfolio_id, position)
            .gql()
    }

    async fn remove_position<'ctx>(
        &self,
        context: &Context<'ctx>,
        portfolio_id: String,
        index: usize,
    ) -> Result<Portfolio> {
        let user = current_user(context)?;
        get_context(context)
            .store()
            .remove_position(user, &portfolio_id, index)
            .gql()
    }

    /// Record a buy or sell and rebuild the holdings from the history
    async fn record_transaction<'ctx>(
        &self,
        context: &Context<'ctx>,
        portfolio_id: String,
        transaction: TransactionInput,
    ) -> Result<Portfolio> {
        let user = current_user(context)?;
        let mut tx = Transaction::new(
            &transaction.symbol,
            transaction.side,
            transaction.shares,
            transaction.price,
            transaction.executed_at.unwrap_or_else(Utc::now),
        )
        .gql()?;
        if let Some(company) = transaction.company {
            tx = tx.with_company(company);
        }

        get_context(context)
            .store()
            .record_transaction(user, &portfolio_id, tx)
            .gql()
    }
}
