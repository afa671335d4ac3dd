use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use sqlx::FromRow;
use time::Date;

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

/// Money always leaves as a two-place string. Postgres hands back zero
/// NUMERIC values without their scale, which would otherwise print as `"0"`.
fn two_places<S: Serializer>(value: &Decimal, s: S) -> Result<S::Ok, S::Error> {
    let mut value = *value;
    value.rescale(2);
    Serialize::serialize(&value, s)
}

/// A report after field coercion; every monetary value is present.
#[derive(Debug, Clone, PartialEq)]
pub struct NewReport {
    pub user_id: Option<i32>,
    /// `None` lets the database default to the current date.
    pub report_date: Option<Date>,
    pub plate: Option<String>,
    pub km_start: Option<i32>,
    pub km_end: Option<i32>,
    pub cost_fuel: Decimal,
    pub cost_toll: Decimal,
    pub cost_other: Decimal,
    pub cost_description: Option<String>,
    pub collection_cash: Decimal,
    pub collection_cc: Decimal,
    pub collection_check: Decimal,
    pub collection_eft: Decimal,
    pub cash_delivered: Decimal,
    pub notes: Option<String>,
}

/// One row of the admin listing, joined with the submitter's display name.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ReportListing {
    pub id: i32,
    pub user_id: Option<i32>,
    #[serde(with = "iso_date")]
    pub report_date: Date,
    pub plate: Option<String>,
    pub km_start: Option<i32>,
    pub km_end: Option<i32>,
    #[serde(serialize_with = "two_places")]
    pub cost_fuel: Decimal,
    #[serde(serialize_with = "two_places")]
    pub cost_toll: Decimal,
    #[serde(serialize_with = "two_places")]
    pub cost_other: Decimal,
    pub cost_description: Option<String>,
    #[serde(serialize_with = "two_places")]
    pub collection_cash: Decimal,
    #[serde(serialize_with = "two_places")]
    pub collection_cc: Decimal,
    #[serde(serialize_with = "two_places")]
    pub collection_check: Decimal,
    #[serde(serialize_with = "two_places")]
    pub collection_eft: Decimal,
    #[serde(serialize_with = "two_places")]
    pub cash_delivered: Decimal,
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn listing(cost_fuel: Decimal, cost_toll: Decimal) -> ReportListing {
        ReportListing {
            id: 1,
            user_id: Some(2),
            report_date: Date::from_calendar_date(2024, time::Month::March, 5).unwrap(),
            plate: Some("16 AB 123".into()),
            km_start: None,
            km_end: None,
            cost_fuel,
            cost_toll,
            cost_other: Decimal::new(705, 2),
            cost_description: None,
            collection_cash: Decimal::ZERO,
            collection_cc: Decimal::ZERO,
            collection_check: Decimal::ZERO,
            collection_eft: Decimal::ZERO,
            cash_delivered: Decimal::from(100),
            notes: None,
            full_name: None,
        }
    }

    #[test]
    fn money_always_has_two_decimal_places() {
        // zero read back from NUMERIC(10,2) carries scale 0
        let json = serde_json::to_value(listing(Decimal::ZERO, Decimal::from_str("12.5").unwrap())).unwrap();
        assert_eq!(json["cost_fuel"], "0.00");
        assert_eq!(json["cost_toll"], "12.50");
        assert_eq!(json["cost_other"], "7.05");
        assert_eq!(json["collection_eft"], "0.00");
        assert_eq!(json["cash_delivered"], "100.00");
    }

    #[test]
    fn listing_dates_are_plain_and_missing_name_is_omitted() {
        let json = serde_json::to_value(listing(Decimal::ZERO, Decimal::ZERO)).unwrap();
        assert_eq!(json["report_date"], "2024-03-05");
        assert!(json.get("full_name").is_none());
    }
}
