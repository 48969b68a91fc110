use super::super::{current_user, get_context, GraphQLResult};
use async_graphql::{Context, Object, Result};
use portfolio_core::alerts::{Alert, AlertCondition, AlertType, Operator};

#[derive(Default)]
pub struct AlertsMutation;

#[Object]
impl AlertsMutation {
    async fn create_alert<'ctx>(
        &self,
        context: &Context<'ctx>,
        symbol: String,
        alert_type: AlertType,
        operator: Operator,
        value: f64,
    ) -> Result<Alert> {
        let user = current_user(context)?;
        get_context(context)
            .store()
            .create_alert(user, &symbol, alert_type, AlertCondition { operator, value })
            .gql()
    }

    async fn deactivate_alert<'ctx>(&self, context: &Context<'ctx>, id: String) -> Result<bool> {
        let user = current_user(context)?;
        get_context(context).store().deactivate_alert(user, &id).gql()?;
        Ok(true)
    }
}
