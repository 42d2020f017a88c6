//! Manual entitlement adjustments for support cases.
//!
//! Only purchased certifications can be changed here. Subscription status
//! always follows Stripe.

use certprep_api::db::CustomerRepository;
use certprep_core::{CertificationId, UserId};

use super::{CommandError, connect};

/// Add a certification to the user's purchased list.
pub async fn grant(user: &str, certification: &str) -> Result<(), CommandError> {
    let certification = CertificationId::parse(certification)?;
    let user_id = UserId::new(user);

    let pool = connect().await?;
    let customers = CustomerRepository::new(&pool);
    let customer = customers
        .get_by_user(&user_id)
        .await?
        .ok_or_else(|| CommandError::NoCustomer(user.to_owned()))?;

    if customer.purchased_certifications.contains(&certification) {
        tracing::info!(user, %certification, "Certification already granted");
        return Ok(());
    }

    customers
        .add_certification(&customer.stripe_customer_id, &certification)
        .await?;

    tracing::info!(user, %certification, customer = %customer.stripe_customer_id, "Certification granted");
    Ok(())
}

/// Remove a certification from the user's purchased list.
pub async fn revoke(user: &str, certification: &str) -> Result<(), CommandError> {
    let certification = CertificationId::parse(certification)?;
    let user_id = UserId::new(user);

    let pool = connect().await?;
    let customers = CustomerRepository::new(&pool);
    let customer = customers
        .get_by_user(&user_id)
        .await?
        .ok_or_else(|| CommandError::NoCustomer(user.to_owned()))?;

    if !customer.purchased_certifications.contains(&certification) {
        tracing::warn!(user, %certification, "Certification was not purchased; nothing to revoke");
        return Ok(());
    }

    customers
        .remove_certification(&customer.stripe_customer_id, &certification)
        .await?;

    tracing::info!(user, %certification, customer = %customer.stripe_customer_id, "Certification revoked");
    Ok(())
}
