//! TLS certificate inspection.

use chrono::{DateTime, Utc};
use x509_parser::certificate::X509Certificate;
use x509_parser::prelude::FromDer;

const SECS_PER_DAY: i64 = 86_400;

/// Whole days of validity left on the first non-CA certificate of a DER
/// chain, measured from `requested_at`.
///
/// CA certificates are skipped; only the first leaf counts. This is not
/// chain validation: the TLS handshake has already done that.
pub fn cert_days_remaining<'a, I>(chain: I, requested_at: DateTime<Utc>) -> Option<i64>
where
    I: IntoIterator<Item = &'a [u8]>,
{
    for der in chain {
        let cert = match X509Certificate::from_der(der) {
            Ok((_, cert)) => cert,
            Err(e) => {
                tracing::trace!("Skipping unparsable peer certificate: {}", e);
                continue;
            }
        };
        if cert.is_ca() {
            continue;
        }
        let not_after = cert.validity().not_after.timestamp();
        return Some((not_after - requested_at.timestamp()) / SECS_PER_DAY);
    }
    None
}
