//! Type inference engine
//!
//! Upgrades the type each parser declared for a field into an
//! [`EnhancedTypeInfo`]: a primary type with value patterns, competing
//! alternatives and an explainable confidence score.
//!
//! ## Enhancer chain
//!
//! Enhancers run in ascending priority order:
//!
//! - **Name** (10) - field naming conventions (`*_id`, `is_*`, `*_date`, ...)
//! - **Pattern** (20) - value formats observed in sample values
//! - **Constraint** (30) - declared constraints (`format`, `enum`, ranges, keys)
//! - **Complex** (40) - item, property and map types of arrays and objects
//!
//! Each enhancer works on a scratch copy that is committed only when it
//! succeeds, so a failing enhancer contributes nothing.
//!
//! ## Example
//!
//! ```rust,ignore
//! use schema_discovery::inference::TypeInferenceEngine;
//!
//! let engine = TypeInferenceEngine::default();
//! let enhanced = engine.enhance_schema(schema);
//! for field in &enhanced.fields {
//!     let info = field.enhanced_type.as_ref().unwrap();
//!     println!("{} -> {} ({:.2})", field.path, info.primary_type, info.confidence.score);
//! }
//! ```

mod alternatives;
mod complex;
mod config;
mod constraint;
mod error;
mod name;
mod pattern;
pub mod patterns;

use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::models::{DataType, EnhancedTypeInfo, FieldInfo, SchemaDetails, TypeConfidence};

pub use alternatives::{MAX_ALTERNATIVE_CONFIDENCE, add_alternative, propose};
pub use complex::ComplexTypeEnhancer;
pub use config::{InferenceConfig, InferenceConfigBuilder};
pub use constraint::ConstraintBasedEnhancer;
pub use error::{InferenceError, InferenceResult};
pub use name::NameBasedEnhancer;
pub use pattern::PatternBasedEnhancer;
pub use patterns::{ValueFormat, detect_value_format};

/// Score every confidence starts from before factors are applied
pub const BASE_SCORE: f64 = 0.5;

const DETECTION_METHOD: &str = "type_inference";

/// One step of the inference chain
pub trait TypeEnhancer: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &str;

    /// Lower priorities run first
    fn priority(&self) -> i32;

    /// Refine `info` for `field`
    fn enhance(
        &self,
        field: &FieldInfo,
        ctx: &EnhancementContext<'_>,
        info: &mut EnhancedTypeInfo,
    ) -> InferenceResult<()>;
}

/// Schema-wide context handed to every enhancer
#[derive(Debug, Clone, Copy)]
pub struct EnhancementContext<'a> {
    pub schema: &'a SchemaDetails,
    pub config: &'a InferenceConfig,
}

impl<'a> EnhancementContext<'a> {
    pub fn new(schema: &'a SchemaDetails, config: &'a InferenceConfig) -> Self {
        Self { schema, config }
    }

    /// Direct children of a path
    pub fn children(&self, path: &str) -> Vec<&'a FieldInfo> {
        let schema = self.schema;
        schema
            .fields
            .iter()
            .filter(|f| f.parent_path() == Some(path))
            .collect()
    }

    /// Whether the field is (part of) the schema's primary key
    pub fn is_primary_key(&self, field: &FieldInfo) -> bool {
        self.schema.primary_keys.iter().any(|k| *k == field.path)
    }

    /// Samples of a field, truncated to the configured maximum
    pub fn samples<'f>(&self, field: &'f FieldInfo) -> &'f [serde_json::Value] {
        let samples = field.sample_values.as_deref().unwrap_or(&[]);
        match self.config.max_samples {
            0 => samples,
            max => &samples[..samples.len().min(max)],
        }
    }
}

/// Initial type info for a field: declared type and nullability
pub fn initial_type_info(field: &FieldInfo) -> EnhancedTypeInfo {
    let mut info = EnhancedTypeInfo::new(field.data_type);
    info.is_nullable = field.nullable;
    info.confidence = TypeConfidence::new(BASE_SCORE, DETECTION_METHOD);
    if field.data_type == DataType::Unknown {
        info.confidence.add_factor("undeclared_type", -0.2);
    } else {
        info.confidence.add_factor("declared_type", 0.2);
    }
    info.confidence.recompute(BASE_SCORE);
    info
}

/// Apply closing bonuses and penalties, then recompute the score
pub fn finalize(info: &mut EnhancedTypeInfo) {
    let evidence = info.confidence.factors.len();
    if !info.patterns.is_empty() {
        info.confidence.add_factor("pattern_match_bonus", 0.1);
    }
    if evidence >= 3 {
        info.confidence.add_factor("multiple_factors_bonus", 0.1);
    }
    let ambiguity = info.possible_alternatives.len().min(3);
    if ambiguity > 0 {
        info.confidence
            .add_factor("ambiguity_penalty", -0.1 * ambiguity as f64);
    }
    info.confidence.recompute(BASE_SCORE);
}

/// Priority-ordered chain of type enhancers
#[derive(Clone)]
pub struct TypeInferenceEngine {
    enhancers: Vec<Arc<dyn TypeEnhancer>>,
    config: InferenceConfig,
}

impl std::fmt::Debug for TypeInferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeInferenceEngine")
            .field("enhancers", &self.enhancer_names())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for TypeInferenceEngine {
    fn default() -> Self {
        Self::new(InferenceConfig::default())
    }
}

impl TypeInferenceEngine {
    /// Engine with the four built-in enhancers
    pub fn new(config: InferenceConfig) -> Self {
        let mut engine = Self::empty(config);
        engine.register(Arc::new(NameBasedEnhancer::new()));
        engine.register(Arc::new(PatternBasedEnhancer::new()));
        engine.register(Arc::new(ConstraintBasedEnhancer::new()));
        engine.register(Arc::new(ComplexTypeEnhancer::new()));
        engine
    }

    /// Engine without enhancers
    pub fn empty(config: InferenceConfig) -> Self {
        Self {
            enhancers: Vec::new(),
            config,
        }
    }

    /// Add an enhancer, keeping the chain sorted by priority
    pub fn register(&mut self, enhancer: Arc<dyn TypeEnhancer>) {
        self.enhancers.push(enhancer);
        // Stable sort keeps registration order among equal priorities
        self.enhancers.sort_by_key(|e| e.priority());
    }

    pub fn config(&self) -> &InferenceConfig {
        &self.config
    }

    pub fn enhancer_names(&self) -> Vec<&str> {
        self.enhancers.iter().map(|e| e.name()).collect()
    }

    /// Run the chain for one field
    pub fn infer_field(&self, field: &FieldInfo, ctx: &EnhancementContext<'_>) -> EnhancedTypeInfo {
        let mut info = initial_type_info(field);
        for enhancer in &self.enhancers {
            let mut scratch = info.clone();
            let outcome = enhancer.enhance(field, ctx, &mut scratch).and_then(|()| {
                let kept = info
                    .confidence
                    .factors
                    .keys()
                    .all(|k| scratch.confidence.has_factor(k));
                if kept {
                    Ok(())
                } else {
                    Err(InferenceError::FactorsRemoved(enhancer.name().to_string()))
                }
            });
            match outcome {
                Ok(()) => info = scratch,
                Err(e) => warn!(
                    enhancer = enhancer.name(),
                    field = %field.path,
                    error = %e,
                    "Type enhancer failed, skipping"
                ),
            }
        }
        finalize(&mut info);
        info
    }

    /// Fill `enhanced_type` of every field and `metadata.type_confidence`
    pub fn enhance_schema(&self, schema: SchemaDetails) -> SchemaDetails {
        let infos: Vec<EnhancedTypeInfo> = {
            let ctx = EnhancementContext::new(&schema, &self.config);
            if self.config.parallel {
                schema
                    .fields
                    .par_iter()
                    .map(|field| self.infer_field(field, &ctx))
                    .collect()
            } else {
                schema
                    .fields
                    .iter()
                    .map(|field| self.infer_field(field, &ctx))
                    .collect()
            }
        };

        let mut schema = schema;
        for (field, info) in schema.fields.iter_mut().zip(infos) {
            schema
                .metadata
                .type_confidence
                .insert(field.path.clone(), info.confidence.score);
            field.enhanced_type = Some(info);
        }
        debug!(
            schema = schema.schema_id().unwrap_or("<unnamed>"),
            fields = schema.fields.len(),
            "Enhanced field types"
        );
        schema
    }

    /// Enhance several schemas
    pub fn enhance_schemas(&self, schemas: Vec<SchemaDetails>) -> Vec<SchemaDetails> {
        schemas
            .into_iter()
            .map(|schema| self.enhance_schema(schema))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TypePattern;

    struct Failing;

    impl TypeEnhancer for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn priority(&self) -> i32 {
            5
        }

        fn enhance(
            &self,
            field: &FieldInfo,
            _ctx: &EnhancementContext<'_>,
            info: &mut EnhancedTypeInfo,
        ) -> InferenceResult<()> {
            info.primary_type = DataType::Binary;
            info.add_pattern(TypePattern::Json);
            Err(InferenceError::EnhancerFailed {
                enhancer: "failing".into(),
                field: field.path.clone(),
                message: "boom".into(),
            })
        }
    }

    struct FactorEraser;

    impl TypeEnhancer for FactorEraser {
        fn name(&self) -> &str {
            "eraser"
        }

        fn priority(&self) -> i32 {
            6
        }

        fn enhance(
            &self,
            _field: &FieldInfo,
            _ctx: &EnhancementContext<'_>,
            info: &mut EnhancedTypeInfo,
        ) -> InferenceResult<()> {
            info.confidence.factors.clear();
            Ok(())
        }
    }

    fn schema_with(field: FieldInfo) -> SchemaDetails {
        let mut schema = SchemaDetails::new().with_id("test");
        schema.fields.push(field);
        schema
    }

    #[test]
    fn test_initial_scores() {
        let declared = initial_type_info(&FieldInfo::new("a", "a", DataType::Integer));
        assert!((declared.confidence.score - 0.7).abs() < 1e-9);
        let unknown = initial_type_info(&FieldInfo::new("a", "a", DataType::Unknown));
        assert!((unknown.confidence.score - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_failing_enhancer_contributes_nothing() {
        let mut engine = TypeInferenceEngine::empty(InferenceConfig::default());
        engine.register(Arc::new(Failing));
        engine.register(Arc::new(FactorEraser));
        let schema = schema_with(FieldInfo::new("code", "code", DataType::String));
        let ctx = EnhancementContext::new(&schema, engine.config());
        let info = engine.infer_field(&schema.fields[0], &ctx);
        assert_eq!(info.primary_type, DataType::String);
        assert!(info.patterns.is_empty());
        assert!(info.confidence.has_factor("declared_type"));
    }

    #[test]
    fn test_enhancers_sorted_by_priority() {
        let mut engine = TypeInferenceEngine::default();
        engine.register(Arc::new(Failing));
        assert_eq!(
            engine.enhancer_names(),
            vec!["failing", "name_based", "pattern_based", "constraint_based", "complex_type"]
        );
    }

    #[test]
    fn test_finalize_bonuses_and_penalty() {
        let mut info = initial_type_info(&FieldInfo::new("a", "a", DataType::String));
        info.confidence.add_factor("x", 0.05);
        info.confidence.add_factor("y", 0.05);
        info.add_pattern(TypePattern::Email);
        add_alternative(&mut info.possible_alternatives, DataType::Uuid, 0.4, "test");
        finalize(&mut info);
        // 0.5 + 0.2 + 0.05 + 0.05 + 0.1 + 0.1 - 0.1
        assert!((info.confidence.score - 0.9).abs() < 1e-9);
        assert!(info.confidence.rationale.contains("ambiguity_penalty"));
    }

    #[test]
    fn test_enhance_schema_fills_confidence_map() {
        let mut field = FieldInfo::new("email", "email", DataType::String);
        field.sample_values = Some(vec!["a@example.com".into(), "b@example.com".into()]);
        let schema = schema_with(field);
        let engine = TypeInferenceEngine::new(InferenceConfig::builder().parallel(false).build());
        let enhanced = engine.enhance_schema(schema);
        let info = enhanced.fields[0].enhanced_type.as_ref().unwrap();
        assert!(info.has_pattern(TypePattern::Email));
        let score = enhanced.metadata.type_confidence["email"];
        assert_eq!(score, info.confidence.score);
        assert!((0.1..=1.0).contains(&score));
    }
}
