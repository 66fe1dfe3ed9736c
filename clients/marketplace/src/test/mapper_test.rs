use ethers::types::{Address, U256};
use serde_json::json;

use crate::errors::MalformedListingError;
use crate::format::native_token;
use crate::mapper::{normalize, normalize_all, normalize_json};
use crate::test::{hex, nft_contract, raw_listing, seller};
use crate::types::*;

#[test]
fn test_normalize_full_record() {
    let listing = normalize(raw_listing(7)).unwrap();

    assert_eq!(listing.id, U256::from(7));
    assert_eq!(listing.asset_contract_address, nft_contract());
    assert_eq!(listing.token_id, U256::from(7));
    assert_eq!(listing.creator_address, seller());
    assert_eq!(listing.status, ListingStatus::Active);
    assert!(!listing.is_reserved_listing);
    assert_eq!(listing.price_per_token, U256::exp10(17));
    assert_eq!(listing.quantity, U256::one());
    assert_eq!(listing.start_time, 1_000);
    assert_eq!(listing.end_time, 4_000_000_000);
    assert_eq!(listing.asset.name, "Token #7");
    assert_eq!(listing.asset.image, "ipfs://image/7");
    assert_eq!(listing.asset.owner, Some(seller()));
    assert_eq!(listing.asset.kind, "ERC721");

    let currency = listing.currency_value_per_token.unwrap();
    assert_eq!(currency.display_value, "0.1");
    assert_eq!(currency.symbol, "rBTC");
    assert_eq!(currency.token_address, native_token());
}

#[test]
fn test_normalize_minimal_record_uses_defaults() {
    let raw = RawListing {
        id: Some(RawUint::Number(3)),
        asset_contract_address: Some(hex(nft_contract())),
        ..Default::default()
    };

    let listing = normalize(raw).unwrap();

    assert_eq!(listing.id, U256::from(3));
    assert_eq!(listing.status, ListingStatus::Active);
    assert_eq!(listing.token_id, U256::zero());
    assert!(!listing.is_reserved_listing);
    assert_eq!(listing.creator_address, Address::zero());
    assert_eq!(listing.currency_value_per_token, None);
    assert_eq!(listing.price_per_token, U256::zero());
    assert_eq!(listing.quantity, U256::one());
    assert_eq!(listing.start_time, 0);
    assert_eq!(listing.end_time, 0);
    assert_eq!(listing.asset, AssetSnapshot::default());
}

#[test]
fn test_normalize_any_subset_of_optional_fields() {
    // Drop every combination of the optional fields; only id and asset contract are required.
    for mask in 0u32..(1 << 9) {
        let mut raw = raw_listing(11);
        let dropped = |bit: u32| mask & (1 << bit) != 0;
        if dropped(0) {
            raw.token_id = None;
        }
        if dropped(1) {
            raw.creator_address = None;
        }
        if dropped(2) {
            raw.status = None;
        }
        if dropped(3) {
            raw.is_reserved_listing = None;
        }
        if dropped(4) {
            raw.currency_value_per_token = None;
        }
        if dropped(5) {
            raw.price_per_token = None;
        }
        if dropped(6) {
            raw.start_time_in_seconds = None;
            raw.end_time_in_seconds = None;
        }
        if dropped(7) {
            raw.asset = None;
        }
        if dropped(8) {
            raw.quantity = None;
        }

        let listing = normalize(raw).unwrap_or_else(|e| panic!("mask {mask:#b}: {e}"));
        assert_eq!(listing.id, U256::from(11));
        assert_eq!(listing.status, ListingStatus::Active);
        if dropped(0) {
            assert_eq!(listing.token_id, U256::zero());
        }
        if dropped(7) {
            assert_eq!(listing.asset.name, "");
            assert_eq!(listing.asset.image, "");
        }
        if dropped(8) {
            assert_eq!(listing.quantity, U256::one());
        }
    }
}

#[test]
fn test_normalize_missing_id() {
    let mut raw = raw_listing(1);
    raw.id = None;
    assert_eq!(normalize(raw), Err(MalformedListingError::MissingId));
}

#[test]
fn test_normalize_invalid_id() {
    let mut raw = raw_listing(1);
    raw.id = Some(RawUint::Text("abc".into()));
    assert_eq!(
        normalize(raw),
        Err(MalformedListingError::InvalidId("abc".into()))
    );
}

#[test]
fn test_normalize_missing_asset_contract() {
    let mut raw = raw_listing(1);
    raw.asset_contract_address = None;
    assert_eq!(normalize(raw), Err(MalformedListingError::MissingAssetContract));

    let mut raw = raw_listing(1);
    raw.asset_contract_address = Some("   ".into());
    assert_eq!(normalize(raw), Err(MalformedListingError::MissingAssetContract));
}

#[test]
fn test_normalize_invalid_asset_contract() {
    let mut raw = raw_listing(1);
    raw.asset_contract_address = Some("0x12".into());
    assert_eq!(
        normalize(raw),
        Err(MalformedListingError::InvalidAssetContract("0x12".into()))
    );
}

#[test]
fn test_normalize_status_names() {
    let cases = [
        ("CREATED", ListingStatus::Created),
        ("ACTIVE", ListingStatus::Active),
        ("completed", ListingStatus::Completed),
        ("CANCELLED", ListingStatus::Cancelled),
        ("EXPIRED", ListingStatus::Expired),
        ("RESERVED", ListingStatus::Active),
        ("3", ListingStatus::Cancelled),
        ("SOMETHING_NEW", ListingStatus::Active),
    ];
    for (status, expected) in cases {
        let mut raw = raw_listing(1);
        raw.status = Some(status.into());
        assert_eq!(normalize(raw).unwrap().status, expected, "{status}");
    }
}

#[test]
fn test_normalize_reserved_flag_is_independent_of_status() {
    let mut raw = raw_listing(1);
    raw.status = Some("RESERVED".into());
    raw.is_reserved_listing = Some(true);

    let listing = normalize(raw).unwrap();
    assert_eq!(listing.status, ListingStatus::Active);
    assert!(listing.is_reserved_listing);
}

#[test]
fn test_normalize_currency_falls_back_to_contract_address() {
    let mut raw = raw_listing(1);
    raw.currency_value_per_token = Some(RawCurrencyValue {
        display_value: Some("25".into()),
        symbol: Some("USDC".into()),
        token_address: None,
    });
    raw.currency_contract_address = Some(hex(Address::from_low_u64_be(0x20)));

    let currency = normalize(raw).unwrap().currency_value_per_token.unwrap();
    assert_eq!(currency.token_address, Address::from_low_u64_be(0x20));
}

#[test]
fn test_normalize_unreadable_currency_address_is_dropped() {
    for address in [Some("0xnot-a-token"), Some(""), None] {
        let mut raw = raw_listing(1);
        raw.currency_value_per_token = Some(RawCurrencyValue {
            display_value: Some("25".into()),
            symbol: Some("USDC".into()),
            token_address: address.map(Into::into),
        });
        raw.currency_contract_address = None;

        let listing = normalize(raw).unwrap();
        assert_eq!(listing.currency_value_per_token, None, "{address:?}");
        assert_eq!(listing.currency(), None);
    }
}

#[test]
fn test_normalize_json_sdk_shape() {
    let value = json!({
        "id": "12",
        "assetContractAddress": hex(nft_contract()),
        "tokenId": "5n",
        "creatorAddress": hex(seller()),
        "status": "ACTIVE",
        "isReservedListing": true,
        "currencyValuePerToken": {
            "displayValue": "0.5",
            "symbol": "rBTC",
            "tokenAddress": NATIVE_TOKEN_ADDRESS
        },
        "pricePerToken": "500000000000000000",
        "quantity": 1,
        "startTimeInSeconds": 1700000000,
        "endTimeInSeconds": "1700604800",
        "asset": {
            "metadata": { "name": "Cat", "image": "ipfs://cat" },
            "owner": hex(seller()),
            "type": "ERC721"
        }
    });

    let listing = normalize_json(value).unwrap();
    assert_eq!(listing.id, U256::from(12));
    assert_eq!(listing.token_id, U256::from(5));
    assert!(listing.is_reserved_listing);
    assert_eq!(listing.price_per_token, U256::from(500_000_000_000_000_000u64));
    assert_eq!(listing.end_time - listing.start_time, DEFAULT_LISTING_DURATION);
    assert_eq!(listing.asset.name, "Cat");
    assert_eq!(listing.asset.description, "");
    assert_eq!(listing.asset.kind, "ERC721");
}

#[test]
fn test_normalize_json_not_an_object() {
    let result = normalize_json(json!([1, 2, 3]));
    assert!(matches!(result, Err(MalformedListingError::NotAnObject(_))));
}

#[test]
fn test_normalize_all_skips_malformed_and_keeps_order() {
    let mut broken = raw_listing(2);
    broken.id = None;
    let raws = vec![raw_listing(3), broken, raw_listing(1), raw_listing(4)];

    let ids: Vec<U256> = normalize_all(raws).into_iter().map(|l| l.id).collect();
    assert_eq!(ids, vec![U256::from(3), U256::from(1), U256::from(4)]);
}

#[test]
fn test_effective_status_follows_window() {
    let mut listing = normalize(raw_listing(1)).unwrap();
    listing.start_time = 100;
    listing.end_time = 200;

    assert_eq!(listing.effective_status(50), ListingStatus::Created);
    assert_eq!(listing.effective_status(100), ListingStatus::Active);
    assert_eq!(listing.effective_status(199), ListingStatus::Active);
    assert_eq!(listing.effective_status(200), ListingStatus::Expired);
    // stored status is untouched
    assert_eq!(listing.status, ListingStatus::Active);

    listing.status = ListingStatus::Cancelled;
    assert_eq!(listing.effective_status(150), ListingStatus::Cancelled);

    listing.status = ListingStatus::Active;
    listing.end_time = 0;
    assert_eq!(listing.effective_status(u64::MAX), ListingStatus::Active);
}

#[test]
fn test_status_codes() {
    for code in 1..=5 {
        let status = ListingStatus::from_u32(code).unwrap();
        assert_eq!(status.as_u32(), code);
    }
    assert_eq!(ListingStatus::from_u32(0), None);
    assert_eq!(ListingStatus::from_u32(6), None);
}
