/// Arrow schemas for batch scoring of stored sensor readings.
pub mod readings {
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
    use std::sync::Arc;

    /// Columns a readings file must provide. Numeric columns may be any
    /// numeric type; they are cast to Float64 on read.
    pub fn input_schema() -> Schema {
        Schema::new(vec![
            Field::new("temperature", DataType::Float64, true),
            Field::new("humidity", DataType::Float64, true),
            Field::new("ethylene", DataType::Float64, true),
            Field::new("co2", DataType::Float64, true),
            Field::new("onion_type", DataType::Utf8, true),
        ])
    }

    /// Columns appended to each scored batch. Null on rows that failed validation.
    pub fn assessment_fields() -> Vec<Field> {
        vec![
            Field::new("condition", DataType::Utf8, true),
            Field::new("risk_level", DataType::UInt32, true),
            Field::new("shelf_life", DataType::Utf8, true),
            Field::new("confidence", DataType::Float32, true),
            Field::new("prob_good", DataType::Float32, true),
            Field::new("prob_risky", DataType::Float32, true),
            Field::new("prob_spoiled", DataType::Float32, true),
            Field::new(
                "recommendations",
                DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
                true,
            ),
            Field::new("error", DataType::Utf8, true),
            Field::new(
                "assessed_at",
                DataType::Timestamp(TimeUnit::Nanosecond, Some("UTC".into())),
                false,
            ),
        ]
    }

    /// Input schema followed by the assessment columns.
    pub fn scored_schema(input: &Schema) -> Schema {
        let mut fields: Vec<Field> = input.fields().iter().map(|f| f.as_ref().clone()).collect();
        fields.extend(assessment_fields());
        Schema::new(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::readings;

    #[test]
    fn input_schema_matches_feature_order() {
        let schema = readings::input_schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        let expected: Vec<&str> = crate::FEATURE_ORDER.iter().map(|f| f.as_str()).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn scored_schema_appends_assessment_columns() {
        let schema = readings::scored_schema(&readings::input_schema());
        assert_eq!(schema.fields().len(), 15);
        assert!(schema.field_with_name("prob_spoiled").is_ok());
        assert!(schema.field_with_name("assessed_at").is_ok());
    }
}
