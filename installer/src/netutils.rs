//! Service CIDR address math.
//!
//! In-cluster add-ons that other components must reach by address get
//! service IPs pinned from the low end of the service CIDR.

use crate::error::Error;
use ipnet::IpNet;
use std::net::IpAddr;

/// Returns the host address at `index` within the CIDR, counting from the
/// first usable address. `lower_band_ip("10.96.0.0/12", 0)` is `10.96.0.1`.
pub fn lower_band_ip(cidr: &str, index: u32) -> Result<IpAddr, Error> {
    let network: IpNet = cidr.trim().parse().map_err(|_| Error::InvalidCidr {
        cidr: cidr.to_string(),
        reason: "not a valid network".to_string(),
    })?;
    network
        .hosts()
        .nth(index as usize)
        .ok_or_else(|| Error::InvalidCidr {
            cidr: cidr.to_string(),
            reason: format!("no host address at index {index}"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pins_addresses_from_the_low_end() {
        assert_eq!(
            lower_band_ip("10.96.0.0/12", 0).unwrap().to_string(),
            "10.96.0.1"
        );
        assert_eq!(
            lower_band_ip("10.96.0.0/12", 10).unwrap().to_string(),
            "10.96.0.11"
        );
        assert_eq!(
            lower_band_ip("10.96.0.0/12", 11).unwrap().to_string(),
            "10.96.0.12"
        );
    }

    #[test]
    fn rejects_garbage_cidrs() {
        assert!(matches!(
            lower_band_ip("not-a-cidr", 0),
            Err(Error::InvalidCidr { .. })
        ));
        assert!(matches!(
            lower_band_ip("", 0),
            Err(Error::InvalidCidr { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_indexes() {
        // A /32 yields a single host address, so index 5 is out of range
        let err = lower_band_ip("10.0.0.0/32", 5).unwrap_err();
        assert!(matches!(err, Error::InvalidCidr { .. }));
    }
}
