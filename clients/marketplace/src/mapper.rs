//! Normalizes raw listing records into the one [`Listing`] shape every view uses.

use ethers::types::{Address, U256};
use tracing::warn;

use crate::errors::MalformedListingError;
use crate::ownership::parse_address;
use crate::types::{
    AssetSnapshot, CurrencyValue, Listing, ListingStatus, RawListing, RawUint,
};

/// Maps one raw record, filling defaults for absent optional fields.
///
/// Only a record without a usable `id` or `assetContractAddress` is rejected.
pub fn normalize(raw: RawListing) -> Result<Listing, MalformedListingError> {
    let id = match &raw.id {
        None => return Err(MalformedListingError::MissingId),
        Some(id) => id
            .to_u256()
            .ok_or_else(|| MalformedListingError::InvalidId(id.text()))?,
    };

    let asset_contract_address = match raw.asset_contract_address.as_deref().map(str::trim) {
        None | Some("") => return Err(MalformedListingError::MissingAssetContract),
        Some(address) => parse_address(address)
            .ok_or_else(|| MalformedListingError::InvalidAssetContract(address.to_string()))?,
    };

    let status = raw
        .status
        .as_deref()
        .and_then(|value| {
            let parsed = ListingStatus::parse(value);
            if parsed.is_none() {
                warn!(listing = %id, status = value, "unknown listing status, using default");
            }
            parsed
        })
        .unwrap_or_default();

    // A currency without a readable token address is dropped, never mapped to 0x0.
    let currency_value_per_token = raw.currency_value_per_token.and_then(|value| {
        let text = value.token_address.or(raw.currency_contract_address)?;
        let Some(token_address) = parse_address(text.trim()) else {
            warn!(
                listing = %id,
                token_address = %text,
                "unreadable currency address, dropping currency"
            );
            return None;
        };
        Some(CurrencyValue {
            display_value: value.display_value.unwrap_or_default(),
            symbol: value.symbol.unwrap_or_default(),
            token_address,
        })
    });

    let asset = raw.asset.unwrap_or_default();
    let metadata = asset.metadata.unwrap_or_default();

    Ok(Listing {
        id,
        asset_contract_address,
        token_id: uint_or(raw.token_id.as_ref(), U256::zero()),
        creator_address: optional_address(raw.creator_address.as_deref()).unwrap_or_default(),
        status,
        is_reserved_listing: raw.is_reserved_listing.unwrap_or(false),
        currency_value_per_token,
        price_per_token: uint_or(raw.price_per_token.as_ref(), U256::zero()),
        quantity: uint_or(raw.quantity.as_ref(), U256::one()),
        start_time: raw
            .start_time_in_seconds
            .as_ref()
            .and_then(RawUint::to_u64)
            .unwrap_or(0),
        end_time: raw
            .end_time_in_seconds
            .as_ref()
            .and_then(RawUint::to_u64)
            .unwrap_or(0),
        asset: AssetSnapshot {
            name: metadata.name.unwrap_or_default(),
            image: metadata.image.unwrap_or_default(),
            description: metadata.description.unwrap_or_default(),
            owner: optional_address(asset.owner.as_deref()),
            kind: asset.kind.unwrap_or_default(),
        },
    })
}

/// Decodes a JSON record before normalizing it.
pub fn normalize_json(value: serde_json::Value) -> Result<Listing, MalformedListingError> {
    let raw: RawListing = serde_json::from_value(value)
        .map_err(|err| MalformedListingError::NotAnObject(err.to_string()))?;
    normalize(raw)
}

/// Maps a page of records in collaborator order, logging and skipping malformed ones.
pub fn normalize_all(raws: Vec<RawListing>) -> Vec<Listing> {
    raws.into_iter()
        .enumerate()
        .filter_map(|(index, raw)| match normalize(raw) {
            Ok(listing) => Some(listing),
            Err(err) => {
                warn!(index, error = %err, "skipping malformed listing");
                None
            }
        })
        .collect()
}

fn uint_or(value: Option<&RawUint>, default: U256) -> U256 {
    value.and_then(RawUint::to_u256).unwrap_or(default)
}

fn optional_address(value: Option<&str>) -> Option<Address> {
    value.map(str::trim).and_then(parse_address)
}
