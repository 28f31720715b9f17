//! Record shaping: pruning, renaming, timestamping and ingredient folding.
//!
//! The steps run in a fixed order because each depends on the shape the
//! previous one leaves behind:
//!
//! 1. **Prune** every field not named by the field mapping.
//! 2. **Rename** each mapped field and stamp the page timestamp.
//! 3. **Fold** `ingredient_{i}`/`measure_{i}` pairs into an `ingredients`
//!    list, when the source asks for it.

use std::collections::BTreeMap;

use api_scraper_source_models::{
    CustomFieldInfo, INGREDIENTS_FIELD, NormalizedRecord, RawRecord, SourceConfig,
    TIMESTAMP_FIELD,
};

use crate::timestamp::Timestamp;
use crate::validate::json_type_name;

/// Errors raised while shaping a page of records.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// The page holds no records. Callers treat this as "nothing to do".
    #[error("no api records found")]
    EmptyRecordSet,

    /// A record is not a JSON object.
    #[error("record {index} is {actual}, expected an object")]
    NotAnObject {
        /// Position of the record in the page.
        index: usize,
        /// JSON type found.
        actual: &'static str,
    },

    /// A mapped or folded field is absent from a record.
    #[error("record {index} has no field '{field}'")]
    MissingField {
        /// Position of the record in the page.
        index: usize,
        /// Field that was expected.
        field: String,
    },

    /// A record carries an unmapped field the first record did not have, so
    /// the page does not share one schema.
    #[error("record {index} has field '{field}' not present on the first record")]
    Heterogeneous {
        /// Position of the record in the page.
        index: usize,
        /// The stray field.
        field: String,
    },

    /// An envelope response lacks the configured records key.
    #[error("response has no '{key}' field")]
    MissingRecordsKey {
        /// The configured records key.
        key: String,
    },

    /// The response body has a shape that cannot hold records.
    #[error("unexpected response shape: {found}")]
    UnexpectedShape {
        /// Description of what was found.
        found: String,
    },
}

impl TransformError {
    /// Whether this is the expected "no records on this page" outcome.
    #[must_use]
    pub const fn is_empty_record_set(&self) -> bool {
        matches!(self, Self::EmptyRecordSet)
    }
}

/// Fails with [`TransformError::EmptyRecordSet`] if `records` is empty.
///
/// # Errors
///
/// Returns [`TransformError::EmptyRecordSet`] for an empty slice.
pub fn ensure_records_exist<T>(records: &[T]) -> Result<(), TransformError> {
    if records.is_empty() {
        Err(TransformError::EmptyRecordSet)
    } else {
        Ok(())
    }
}

/// Shapes raw pages into [`NormalizedRecord`]s for one source.
///
/// Built once per page so that every record in the page shares the same
/// [`Timestamp`].
#[derive(Debug, Clone)]
pub struct RecordTransformer<'a> {
    field_mapping: &'a BTreeMap<String, String>,
    ingredient_max_count: Option<u32>,
    timestamp: Timestamp,
}

impl<'a> RecordTransformer<'a> {
    /// Creates a transformer from a source's configuration.
    #[must_use]
    pub fn new(config: &'a SourceConfig, timestamp: Timestamp) -> Self {
        Self::from_parts(&config.field_mapping, &config.custom_field_info, timestamp)
    }

    /// Creates a transformer from a field mapping and shaping options.
    #[must_use]
    pub const fn from_parts(
        field_mapping: &'a BTreeMap<String, String>,
        custom_field_info: &CustomFieldInfo,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            field_mapping,
            ingredient_max_count: custom_field_info.ingredient_max_count,
            timestamp,
        }
    }

    /// The timestamp stamped onto this page's records.
    #[must_use]
    pub const fn timestamp(&self) -> &Timestamp {
        &self.timestamp
    }

    /// Runs the full pipeline over one page of records.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError::EmptyRecordSet`] for an empty page, or a
    /// shape error if the records do not match the configured mapping.
    pub fn transform(
        &self,
        records: Vec<serde_json::Value>,
    ) -> Result<Vec<NormalizedRecord>, TransformError> {
        ensure_records_exist(&records)?;

        let records = into_objects(records)?;
        let records = prune_fields(records, self.field_mapping)?;
        let mut records = rename_fields(records, self.field_mapping, &self.timestamp)?;

        if let Some(max_count) = self.ingredient_max_count {
            records = fold_ingredients(records, max_count)?;
        }

        Ok(records.into_iter().map(NormalizedRecord::from_map).collect())
    }
}

/// Unwraps each JSON value into its field map.
///
/// # Errors
///
/// Returns [`TransformError::NotAnObject`] for the first non-object record.
pub fn into_objects(records: Vec<serde_json::Value>) -> Result<Vec<RawRecord>, TransformError> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| match record {
            serde_json::Value::Object(fields) => Ok(fields),
            other => Err(TransformError::NotAnObject {
                index,
                actual: json_type_name(&other),
            }),
        })
        .collect()
}

/// Drops every field the mapping does not name.
///
/// The first record's fields define the page schema: fields it carries
/// outside the mapping are removed from every record. A later record with
/// an unmapped field the first record lacks breaks that assumption and
/// fails the page.
///
/// # Errors
///
/// Returns [`TransformError::EmptyRecordSet`] for an empty page, or
/// [`TransformError::Heterogeneous`] for a record outside the page schema.
pub fn prune_fields(
    mut records: Vec<RawRecord>,
    field_mapping: &BTreeMap<String, String>,
) -> Result<Vec<RawRecord>, TransformError> {
    let first = records.first().ok_or(TransformError::EmptyRecordSet)?;

    let keys_to_remove: Vec<String> = first
        .keys()
        .filter(|key| !field_mapping.contains_key(*key))
        .cloned()
        .collect();

    for (index, record) in records.iter_mut().enumerate() {
        for key in &keys_to_remove {
            record.remove(key);
        }
        if let Some(stray) = record.keys().find(|key| !field_mapping.contains_key(*key)) {
            return Err(TransformError::Heterogeneous {
                index,
                field: stray.clone(),
            });
        }
    }

    Ok(records)
}

/// Renames each mapped field and stamps the page timestamp.
///
/// Each record is rebuilt from the mapping, so swaps such as `a → b`,
/// `b → a` are well-defined.
///
/// # Errors
///
/// Returns [`TransformError::MissingField`] if a record lacks a mapped
/// field.
pub fn rename_fields(
    records: Vec<RawRecord>,
    field_mapping: &BTreeMap<String, String>,
    timestamp: &Timestamp,
) -> Result<Vec<RawRecord>, TransformError> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, mut record)| {
            let mut renamed = RawRecord::new();
            for (old_key, new_key) in field_mapping {
                let value = record
                    .remove(old_key)
                    .ok_or_else(|| TransformError::MissingField {
                        index,
                        field: old_key.clone(),
                    })?;
                renamed.insert(new_key.clone(), value);
            }
            renamed.insert(TIMESTAMP_FIELD.to_owned(), timestamp.clone().into());
            Ok(renamed)
        })
        .collect()
}

/// Folds `ingredient_{i}`/`measure_{i}` for `1..=max_count` into a single
/// `ingredients` list.
///
/// Slots whose ingredient is `null` or empty are dropped without an entry.
/// Every record ends up with an `ingredients` field, possibly empty.
///
/// # Errors
///
/// Returns [`TransformError::MissingField`] if either field of a slot is
/// absent.
pub fn fold_ingredients(
    records: Vec<RawRecord>,
    max_count: u32,
) -> Result<Vec<RawRecord>, TransformError> {
    records
        .into_iter()
        .enumerate()
        .map(|(index, mut record)| {
            let mut ingredients = Vec::new();
            for slot in 1..=max_count {
                let ingredient_key = format!("ingredient_{slot}");
                let measure_key = format!("measure_{slot}");

                let mut take = |key: &str| {
                    record
                        .remove(key)
                        .ok_or_else(|| TransformError::MissingField {
                            index,
                            field: key.to_owned(),
                        })
                };
                let ingredient = take(&ingredient_key)?;
                let measure = take(&measure_key)?;

                if ingredient.is_null() || ingredient.as_str() == Some("") {
                    continue;
                }

                let mut entry = RawRecord::new();
                entry.insert(ingredient_key, ingredient);
                entry.insert(measure_key, measure);
                ingredients.push(serde_json::Value::Object(entry));
            }
            record.insert(
                INGREDIENTS_FIELD.to_owned(),
                serde_json::Value::Array(ingredients),
            );
            Ok(record)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_INGREDIENTS: u32 = 15;

    fn timestamp() -> Timestamp {
        Timestamp::parse("2024-06-05 15:51:58.084937+01:00").unwrap()
    }

    fn fruit(id: u64, name: &str, family: &str, genus: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "id": id,
            "family": family,
            "order": "Rosales",
            "genus": genus,
            "nutritions": {
                "calories": 81,
                "fat": 0.0,
                "sugar": 18.0,
                "carbohydrates": 18.0,
                "protein": 0.0
            }
        })
    }

    fn fruits() -> Vec<serde_json::Value> {
        vec![
            fruit(52, "Persimmon", "Ebenaceae", "Diospyros"),
            fruit(3, "Strawberry", "Rosaceae", "Fragaria"),
        ]
    }

    fn fruit_mapping() -> BTreeMap<String, String> {
        [
            ("id", "id1"),
            ("name", "name"),
            ("family", "family1"),
            ("genus", "genus1"),
            ("order", "order1"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect()
    }

    fn drink(id: &str, name: &str, ingredients: &[(&str, Option<&str>)]) -> serde_json::Value {
        let mut record = serde_json::json!({
            "idDrink": id,
            "strDrink": name,
            "strDrinkAlternate": null,
            "strTags": "IBA,ContemporaryClassic",
            "strCategory": "Cocktail",
            "strAlcoholic": "Alcoholic",
            "strGlass": "Highball glass",
            "strInstructions": "Muddle mint leaves with sugar and lime juice.",
            "strDrinkThumb": "https://www.thecocktaildb.com/images/media/drink/metwgh1606770327.jpg",
            "strImageSource": null,
            "strImageAttribution": null,
            "strCreativeCommonsConfirmed": "No",
            "dateModified": "2016-11-04 09:17:09"
        });
        for slot in 1..=MAX_INGREDIENTS as usize {
            let (ingredient, measure) = ingredients
                .get(slot - 1)
                .map_or((serde_json::Value::Null, serde_json::Value::Null), |(i, m)| {
                    (serde_json::json!(i), serde_json::json!(m))
                });
            record[format!("strIngredient{slot}")] = ingredient;
            record[format!("strMeasure{slot}")] = measure;
        }
        record
    }

    fn drink_mapping() -> BTreeMap<String, String> {
        let mut mapping: BTreeMap<String, String> = [
            ("idDrink", "id"),
            ("strDrink", "name"),
            ("strAlcoholic", "alcoholic"),
            ("strGlass", "glass"),
            ("strInstructions", "instructions"),
            ("strDrinkThumb", "thumbnail_link"),
            ("strImageSource", "image_source"),
            ("strImageAttribution", "image_attribution"),
            ("strCreativeCommonsConfirmed", "creative_commons_confirmed"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();
        for slot in 1..=MAX_INGREDIENTS {
            mapping.insert(format!("strIngredient{slot}"), format!("ingredient_{slot}"));
            mapping.insert(format!("strMeasure{slot}"), format!("measure_{slot}"));
        }
        mapping
    }

    fn drinks() -> Vec<serde_json::Value> {
        vec![
            drink(
                "11000",
                "Mojito",
                &[
                    ("White Rum", Some("2 oz")),
                    ("Lime", Some("Juice of 1")),
                    ("Sugar", Some("2 tsp")),
                    ("Mint", Some("2-4")),
                    ("Soda water", None),
                ],
            ),
            drink("11001", "Old Fashioned", &[("Bourbon", Some("4.5 cL")), ("", None)]),
        ]
    }

    fn drink_custom_info() -> CustomFieldInfo {
        CustomFieldInfo {
            ingredient_max_count: Some(MAX_INGREDIENTS),
            ..CustomFieldInfo::default()
        }
    }

    fn sorted_keys(record: &RawRecord) -> Vec<String> {
        let mut keys: Vec<String> = record.keys().cloned().collect();
        keys.sort();
        keys
    }

    #[test]
    fn empty_page_is_an_empty_record_set() {
        let mapping = fruit_mapping();
        let transformer =
            RecordTransformer::from_parts(&mapping, &CustomFieldInfo::default(), timestamp());
        let err = transformer.transform(Vec::new()).unwrap_err();
        assert!(err.is_empty_record_set());
    }

    #[test]
    fn prunes_fields_outside_the_mapping() {
        let mapping = fruit_mapping();
        let records = prune_fields(into_objects(fruits()).unwrap(), &mapping).unwrap();
        let mut expected: Vec<String> = mapping.keys().cloned().collect();
        expected.sort();
        for record in &records {
            assert_eq!(sorted_keys(record), expected);
        }
    }

    #[test]
    fn prunes_drinks_to_mapped_fields() {
        let mapping = drink_mapping();
        let records = prune_fields(into_objects(drinks()).unwrap(), &mapping).unwrap();
        assert_eq!(records[0].len(), mapping.len());
        assert!(records[0].get("dateModified").is_none());
    }

    #[test]
    fn pruning_keeps_first_record_intersection() {
        let mut mapping = fruit_mapping();
        mapping.insert("color".to_owned(), "colour".to_owned());
        let records = prune_fields(into_objects(fruits()).unwrap(), &mapping).unwrap();
        assert_eq!(records[0].len(), 5);
        assert!(records[0].get("nutritions").is_none());
    }

    #[test]
    fn pruning_rejects_records_outside_page_schema() {
        let mut page = fruits();
        page[1]["sweetness"] = serde_json::json!(7);
        let err = prune_fields(into_objects(page).unwrap(), &fruit_mapping()).unwrap_err();
        assert!(matches!(
            err,
            TransformError::Heterogeneous { index: 1, ref field } if field == "sweetness"
        ));
    }

    #[test]
    fn renames_to_mapping_targets_plus_timestamp() {
        let mapping = fruit_mapping();
        let records = prune_fields(into_objects(fruits()).unwrap(), &mapping).unwrap();
        let records = rename_fields(records, &mapping, &timestamp()).unwrap();

        let mut expected: Vec<String> = mapping.values().cloned().collect();
        expected.push(TIMESTAMP_FIELD.to_owned());
        expected.sort();
        for record in &records {
            assert_eq!(sorted_keys(record), expected);
        }
    }

    #[test]
    fn rename_handles_swapped_keys() {
        let mapping: BTreeMap<String, String> = [("a", "b"), ("b", "a")]
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        let records = into_objects(vec![serde_json::json!({"a": 1, "b": 2})]).unwrap();
        let records = rename_fields(records, &mapping, &timestamp()).unwrap();
        assert_eq!(records[0]["a"], 2);
        assert_eq!(records[0]["b"], 1);
    }

    #[test]
    fn rename_fails_on_missing_mapped_field() {
        let mut mapping = fruit_mapping();
        mapping.insert("color".to_owned(), "colour".to_owned());
        let records = prune_fields(into_objects(fruits()).unwrap(), &mapping).unwrap();
        let err = rename_fields(records, &mapping, &timestamp()).unwrap_err();
        assert!(matches!(
            err,
            TransformError::MissingField { index: 0, ref field } if field == "color"
        ));
    }

    #[test]
    fn transforms_persimmon_example() {
        let mapping = fruit_mapping();
        let transformer =
            RecordTransformer::from_parts(&mapping, &CustomFieldInfo::default(), timestamp());
        let records = transformer.transform(fruits()).unwrap();

        assert_eq!(
            serde_json::Value::from(records[0].clone()),
            serde_json::json!({
                "id1": 52,
                "name": "Persimmon",
                "family1": "Ebenaceae",
                "genus1": "Diospyros",
                "order1": "Rosales",
                "timestamp": "2024-06-05 15:51:58.084937+01:00"
            })
        );
    }

    #[test]
    fn folds_ingredients_into_list() {
        let mapping = drink_mapping();
        let transformer = RecordTransformer::from_parts(&mapping, &drink_custom_info(), timestamp());
        let records = transformer.transform(drinks()).unwrap();

        let ingredients = records[0].get(INGREDIENTS_FIELD).unwrap().as_array().unwrap();
        assert_eq!(ingredients.len(), 5);
        assert_eq!(ingredients[0]["ingredient_1"], "White Rum");
        assert_eq!(ingredients[0]["measure_1"], "2 oz");
        assert_eq!(ingredients[4]["measure_5"], serde_json::Value::Null);

        let ingredients = records[1].get(INGREDIENTS_FIELD).unwrap().as_array().unwrap();
        assert_eq!(ingredients.len(), 1);
        assert_eq!(ingredients[0]["ingredient_1"], "Bourbon");
    }

    #[test]
    fn folding_removes_numbered_fields() {
        let mapping = drink_mapping();
        let transformer = RecordTransformer::from_parts(&mapping, &drink_custom_info(), timestamp());
        let records = transformer.transform(drinks()).unwrap();

        let expected = vec![
            "alcoholic",
            "creative_commons_confirmed",
            "glass",
            "id",
            "image_attribution",
            "image_source",
            "ingredients",
            "instructions",
            "name",
            "thumbnail_link",
            "timestamp",
        ];
        for record in &records {
            let mut keys: Vec<&str> = record.keys().collect();
            keys.sort_unstable();
            assert_eq!(keys, expected);
        }
    }

    #[test]
    fn folding_with_zero_slots_adds_empty_list() {
        let records = into_objects(vec![serde_json::json!({"name": "Water"})]).unwrap();
        let records = fold_ingredients(records, 0).unwrap();
        assert_eq!(records[0][INGREDIENTS_FIELD], serde_json::json!([]));
    }

    #[test]
    fn folding_fails_on_missing_measure() {
        let records = into_objects(vec![serde_json::json!({"ingredient_1": "Gin"})]).unwrap();
        let err = fold_ingredients(records, 1).unwrap_err();
        assert!(matches!(
            err,
            TransformError::MissingField { ref field, .. } if field == "measure_1"
        ));
    }

    #[test]
    fn rejects_non_object_records() {
        let err = into_objects(vec![serde_json::json!({"a": 1}), serde_json::json!("b")])
            .unwrap_err();
        assert!(matches!(err, TransformError::NotAnObject { index: 1, actual: "string" }));
    }

    #[test]
    fn all_records_in_page_share_timestamp() {
        let mapping = fruit_mapping();
        let transformer =
            RecordTransformer::from_parts(&mapping, &CustomFieldInfo::default(), timestamp());
        let records = transformer.transform(fruits()).unwrap();
        let stamp = transformer.timestamp().as_str();
        assert!(records.iter().all(|r| r.get(TIMESTAMP_FIELD).unwrap() == stamp));
    }
}
