//! Check-expiry command

use chrono::{DateTime, Utc};
use riic::validate::{CertExpiration, ExpiryStatus};

use super::Platform;
use crate::{Error, Result};

const DATE_FORMAT: &str = "%m/%d/%Y";

pub async fn run(platform: &Platform) -> Result<()> {
    let expiration = CertExpiration::new(platform.secrets());
    let now = Utc::now();

    let root = expiration.root_expiration().await?;
    println!("{}", report("Root", root, now));

    let manifests = platform.manifests().rotatable_manifests().await?;
    for manifest in &manifests {
        let intermediate = expiration
            .intermediate_expiration(manifest)
            .await
            .map_err(|e| {
                Error::command_failed(format!("could not check expiration date: {}", e))
            })?;
        let name = format!("{} intermediate", manifest.deployment_name());
        println!("{}", report(&name, intermediate, now));
    }
    Ok(())
}

/// One line describing when a certificate expires
fn report(name: &str, expiration: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let date = expiration.format(DATE_FORMAT);
    let mark = match ExpiryStatus::at(expiration, now) {
        ExpiryStatus::Expired => return format!("❌ {} cert expired on: {}", name, date),
        ExpiryStatus::ExpiringSoon => "⚠️",
        ExpiryStatus::Valid => "✅",
    };
    format!(
        "{} {} cert is valid for {} more days, it expires on: {}",
        mark,
        name,
        (expiration - now).num_days(),
        date
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2020, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn expired_certs_show_the_expiry_date() {
        let expired = Utc.with_ymd_and_hms(2020, 2, 14, 0, 0, 0).unwrap();
        assert_eq!(
            report("Root", expired, now()),
            "❌ Root cert expired on: 02/14/2020"
        );
    }

    #[test]
    fn certs_expiring_within_ninety_days_warn() {
        let line = report("cf-1234 intermediate", now() + Duration::days(30), now());
        assert_eq!(
            line,
            "⚠️ cf-1234 intermediate cert is valid for 30 more days, it expires on: 03/31/2020"
        );
    }

    #[test]
    fn long_lived_certs_pass() {
        let line = report("Root", now() + Duration::days(400), now());
        assert!(line.starts_with("✅ Root cert is valid for 400 more days"));
        assert!(line.ends_with("04/05/2021"));
    }
}
