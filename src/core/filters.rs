use crate::models::{Gender, ProductRecord};

/// Check if an item of `gender` can be shown next to a `target` item
///
/// Unisex on either side is compatible with everything.
#[inline]
pub fn matches_gender(gender: Gender, target: Gender) -> bool {
    gender == target || gender == Gender::Unisex || target == Gender::Unisex
}

/// Keep the gender-compatible records, in input order
pub fn filter_by_gender<'a, I>(records: I, target: Gender) -> Vec<&'a ProductRecord>
where
    I: IntoIterator<Item = &'a ProductRecord>,
{
    records
        .into_iter()
        .filter(|record| matches_gender(record.gender, target))
        .collect()
}

/// Order records into a primary and a secondary gender group
///
/// - men: men first, then unisex
/// - women: women first, then unisex
/// - unisex: unisex first, then everything else
///
/// Each group keeps input order. Records in neither group are dropped.
pub fn order_by_gender<'a, I>(records: I, target: Gender) -> Vec<&'a ProductRecord>
where
    I: IntoIterator<Item = &'a ProductRecord>,
{
    let mut primary = Vec::new();
    let mut secondary = Vec::new();

    for record in records {
        if record.gender == target {
            primary.push(record);
        } else if target == Gender::Unisex || record.gender == Gender::Unisex {
            secondary.push(record);
        }
    }

    primary.extend(secondary);
    primary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AttributeBundle;
    use chrono::Utc;

    fn create_record(id: i64, gender: Gender) -> ProductRecord {
        ProductRecord {
            id,
            attributes: AttributeBundle::default(),
            gender,
            created_at: Utc::now(),
            purchasable: true,
        }
    }

    fn ids(records: &[&ProductRecord]) -> Vec<i64> {
        records.iter().map(|r| r.id).collect()
    }

    fn mixed() -> Vec<ProductRecord> {
        vec![
            create_record(1, Gender::Unisex),
            create_record(2, Gender::Men),
            create_record(3, Gender::Women),
            create_record(4, Gender::Men),
            create_record(5, Gender::Unisex),
        ]
    }

    #[test]
    fn test_matches_gender() {
        assert!(matches_gender(Gender::Men, Gender::Men));
        assert!(matches_gender(Gender::Unisex, Gender::Women));
        assert!(matches_gender(Gender::Women, Gender::Unisex));
        assert!(!matches_gender(Gender::Women, Gender::Men));
    }

    #[test]
    fn test_filter_unisex_accepts_everything() {
        let records = mixed();
        assert_eq!(filter_by_gender(&records, Gender::Unisex).len(), 5);
    }

    #[test]
    fn test_filter_men() {
        let records = mixed();
        assert_eq!(ids(&filter_by_gender(&records, Gender::Men)), vec![1, 2, 4, 5]);
    }

    #[test]
    fn test_order_men_before_unisex() {
        let records = mixed();
        assert_eq!(ids(&order_by_gender(&records, Gender::Men)), vec![2, 4, 1, 5]);
    }

    #[test]
    fn test_order_women_drops_men() {
        let records = mixed();
        assert_eq!(ids(&order_by_gender(&records, Gender::Women)), vec![3, 1, 5]);
    }

    #[test]
    fn test_order_unisex_keeps_everyone() {
        let records = mixed();
        assert_eq!(ids(&order_by_gender(&records, Gender::Unisex)), vec![1, 5, 2, 3, 4]);
    }
}
