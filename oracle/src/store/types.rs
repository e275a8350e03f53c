//! Wire/column conversions between domain types and the decimal-string,
//! CSV-encoded columns the schema stores them as.
//!
//! Bignums are stored as `NUMERIC` decimal strings rather than native
//! 64-bit columns, the same choice the original Go store made with its
//! `BigInt` `sql.Scanner`/`driver.Valuer` wrapper -- Postgres `NUMERIC` has
//! no fixed width, so it is the only column type that can hold a `U256`
//! without silently truncating it.

use alloy_primitives::{Address, U256};

use super::StoreError;

pub fn u256_to_sql(value: U256) -> String {
    value.to_string()
}

pub fn u256_from_sql(value: &str) -> Result<U256, StoreError> {
    U256::from_str_radix(value, 10).map_err(|e| StoreError::Decode(format!("invalid u256 {value:?}: {e}")))
}

pub fn address_to_sql(value: Address) -> String {
    value.to_checksum(None)
}

pub fn address_from_sql(value: &str) -> Result<Address, StoreError> {
    value
        .parse::<Address>()
        .map_err(|e| StoreError::Decode(format!("invalid address {value:?}: {e}")))
}

/// Encodes a validator set as comma-separated checksummed addresses,
/// mirroring the original store's CSV-encoded `SQLStringArray` column.
pub fn addresses_to_csv(addresses: &[Address]) -> String {
    addresses
        .iter()
        .map(|a| a.to_checksum(None))
        .collect::<Vec<_>>()
        .join(",")
}

pub fn addresses_from_csv(value: &str) -> Result<Vec<Address>, StoreError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value.split(',').map(address_from_sql).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn csv_roundtrip_empty() {
        assert_eq!(addresses_from_csv("").unwrap(), Vec::<Address>::new());
        assert_eq!(addresses_to_csv(&[]), "");
    }

    #[test]
    fn csv_roundtrip_nonempty() {
        let addrs = vec![
            address!("1111111111111111111111111111111111111111"),
            address!("2222222222222222222222222222222222222222"),
        ];
        let csv = addresses_to_csv(&addrs);
        assert_eq!(addresses_from_csv(&csv).unwrap(), addrs);
    }

    #[test]
    fn u256_roundtrip_large_value() {
        let value = U256::MAX;
        let sql = u256_to_sql(value);
        assert_eq!(u256_from_sql(&sql).unwrap(), value);
    }
}
