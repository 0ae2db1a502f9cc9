//! SQL fragments for layers that evaluate filters in their database.
//!
//! Identifiers and literals go through the layer's own escapers. BBOX
//! operands are left to the rectangle query and contribute no condition.

use super::{value_kind, Dialect, Rendered, ValueKind};
use crate::ast::*;
use crate::config::FilterConfig;
use crate::error::RenderError;
use crate::layer::{ConnectionType, Layer};
use crate::time;
use tracing::warn;

pub struct SqlExpression<'a> {
    config: &'a FilterConfig,
}

impl<'a> SqlExpression<'a> {
    pub fn new(config: &'a FilterConfig) -> Self { SqlExpression { config } }

    fn binary(&self, layer: &dyn Layer, operator: BinaryOperator, property: &str, literal: &Literal) -> String {
        let kind = match &literal.value {
            Some(value) => value_kind(layer, self.config, property, &[value], false),
            None => ValueKind::String,
        };
        let name = layer.escape_property_name(property);
        let lowered = kind == ValueKind::String && operator == BinaryOperator::EqualTo && literal.case_insensitive;

        let mut sql = String::from(" (");
        if lowered {
            sql.push_str(&format!("lower({name}) "));
        } else {
            sql.push_str(&name);
        }
        sql.push_str(match operator {
            BinaryOperator::EqualTo => "=",
            BinaryOperator::NotEqualTo => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::LessThanOrEqualTo => "<=",
            BinaryOperator::GreaterThanOrEqualTo => ">=",
        });
        sql.push(' ');

        match (&literal.value, kind) {
            (Some(value), _) if lowered => sql.push_str(&format!("lower('{}') ", layer.escape_sql_param(value))),
            (Some(value), ValueKind::String) => sql.push_str(&format!("'{}'", layer.escape_sql_param(value))),
            (Some(value), _) => sql.push_str(value),
            (None, _) => sql.push_str("''"),
        }
        sql.push_str(") ");
        sql
    }

    fn between(&self, layer: &dyn Layer, property: &str, bounds: &Boundary) -> Rendered {
        if bounds.lower.contains(';') || bounds.upper.contains(';') {
            return Err(RenderError::InvalidBoundary(bounds.to_string()));
        }
        let quote = match value_kind(layer, self.config, property, &[&bounds.lower, &bounds.upper], false) {
            ValueKind::String => "'",
            _ => "",
        };
        Ok(Some(format!(
            " ({} BETWEEN {quote}{}{quote} AND {quote}{}{quote})",
            layer.escape_property_name(property),
            layer.escape_sql_param(&bounds.lower),
            layer.escape_sql_param(&bounds.upper),
        )))
    }

    fn like(&self, layer: &dyn Layer, property: &str, pattern: &str, options: &LikeOptions) -> Rendered {
        let (Some(wild), Some(single), Some(escape)) =
            (options.wild_card.chars().next(), options.single_char.chars().next(), options.escape_char.chars().next())
        else {
            return Err(RenderError::IncompleteLike);
        };
        if escape == '\'' {
            warn!("rejecting PropertyIsLike on {property}: quote used as escape character");
            return Err(RenderError::QuoteEscapeChar);
        }

        let connection = layer.connection_type();
        let mut sql = format!(" ({}", layer.escape_property_name(property));
        sql.push_str(match (connection, options.case_insensitive) {
            (ConnectionType::PostGis, true) => "::text ilike '",
            (ConnectionType::PostGis, false) => "::text like '",
            _ => " like '",
        });

        let mut chars = pattern.chars();
        while let Some(c) = chars.next() {
            if c == single {
                sql.push('_');
            } else if c == escape {
                sql.push(escape);
                match chars.next() {
                    Some('\'') => sql.push_str("''"),
                    Some(next) => sql.push(next),
                    None => {}
                }
            } else if c == wild {
                sql.push('%');
            } else if c == '\'' {
                sql.push_str("''");
            } else if c == '\\' {
                sql.push_str("\\\\");
            } else {
                sql.push(c);
            }
        }
        sql.push('\'');

        if *connection != ConnectionType::Ogr {
            sql.push_str(match (connection, escape) {
                (ConnectionType::PostGis, '\\') => " escape E'",
                _ => " escape '",
            });
            sql.push(escape);
            if escape == '\\' {
                sql.push('\\');
            }
            sql.push('\'');
        }
        sql.push_str(") ");
        Ok(Some(sql))
    }
}

impl Dialect for SqlExpression<'_> {
    const NAME: &'static str = "SQL";

    fn comparison(&self, comparison: &Comparison, layer: &dyn Layer) -> Rendered {
        match comparison {
            Comparison::Binary { operator, property, literal } => Ok(Some(self.binary(layer, *operator, property, literal))),
            Comparison::Between { property, bounds } => self.between(layer, property, bounds),
            Comparison::Like { property, pattern, options } => self.like(layer, property, pattern, options),
            Comparison::IsNull { .. } | Comparison::IsNil { .. } => {
                Err(RenderError::UnsupportedOperator { operator: comparison.operator_name(), backend: Self::NAME })
            }
        }
    }

    fn spatial(&self, spatial: &Spatial, _layer: &dyn Layer) -> Rendered {
        match spatial {
            Spatial::BBox(_) => Ok(None),
            _ => Err(RenderError::UnsupportedOperator { operator: spatial.operator_name(), backend: Self::NAME }),
        }
    }

    fn temporal(&self, temporal: &Temporal, layer: &dyn Layer) -> Rendered {
        let Temporal::During { property, period } = temporal;
        if *layer.connection_type() == ConnectionType::Ogr {
            return Err(RenderError::UnsupportedOperator { operator: "During", backend: Self::NAME });
        }
        match time::time_filter(property, &period.to_string(), layer.time_syntax()) {
            Some(expression) => Ok(Some(expression)),
            None => Err(RenderError::InvalidTime(period.to_string())),
        }
    }

    fn feature_ids(&self, ids: &FeatureIds, layer: &dyn Layer) -> Rendered {
        let attribute = layer
            .metadata()
            .lookup(&self.config.metadata_namespaces, "featureid")
            .ok_or(RenderError::MissingMetadata("featureid"))?;
        let casts = matches!(layer.connection_type(), ConnectionType::Ogr | ConnectionType::PostGis);

        // once an id is not numeric every following id is compared as a string
        let mut quoted = false;
        let mut terms = Vec::new();
        for id in &ids.0 {
            let id = id.split_once('.').map_or(id.as_str(), |(_, local)| local);
            if id.is_empty() {
                continue;
            }
            quoted |= !super::is_numeric(id);
            let id = layer.escape_sql_param(id);
            terms.push(match (quoted, casts) {
                (true, true) => format!("(CAST({attribute} AS CHARACTER(255)) = '{id}')"),
                (true, false) => format!("({attribute} = '{id}')"),
                (false, _) => format!("({attribute} = {id})"),
            });
        }
        if terms.is_empty() {
            return Ok(None);
        }
        Ok(Some(format!("({})", terms.join(" OR "))))
    }

    fn and(&self, left: &str, right: &str) -> String { format!(" ({left} AND {right}) ") }

    fn or(&self, left: &str, right: &str) -> String { format!(" ({left} OR {right}) ") }

    fn not(&self, operand: &str) -> String { format!(" (NOT {operand}) ") }

    fn handled_elsewhere(&self, operand: &Filter, layer: &dyn Layer) -> bool {
        operand.is_bbox() || (*layer.connection_type() == ConnectionType::Ogr && matches!(operand, Filter::Temporal(_)))
    }
}
