//! Explicit output schema description.
//!
//! One [`SchemaDescription`] value drives both the format instructions sent to the
//! model and the validation of what comes back.

use serde_json::{Map, Value, json};

use crate::error::{SchemaValidationError, Violation};

/// Shape of a value the model must produce. Every node is required; arrays must
/// be non-empty and strings non-blank.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    String {
        description: &'static str,
    },
    Array {
        description: &'static str,
        items: Box<SchemaNode>,
    },
    Object {
        description: &'static str,
        fields: Vec<SchemaField>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaField {
    pub name: &'static str,
    pub node: SchemaNode,
}

fn field(name: &'static str, node: SchemaNode) -> SchemaField {
    SchemaField { name, node }
}

fn string(description: &'static str) -> SchemaNode {
    SchemaNode::String { description }
}

fn list(description: &'static str, items: SchemaNode) -> SchemaNode {
    SchemaNode::Array {
        description,
        items: Box::new(items),
    }
}

fn strings(description: &'static str) -> SchemaNode {
    list(description, string(""))
}

fn object(description: &'static str, fields: Vec<SchemaField>) -> SchemaNode {
    SchemaNode::Object {
        description,
        fields,
    }
}

impl SchemaNode {
    fn description(&self) -> &'static str {
        match self {
            Self::String { description }
            | Self::Array { description, .. }
            | Self::Object { description, .. } => description,
        }
    }

    fn to_json_schema(&self) -> Value {
        let mut out = match self {
            Self::String { .. } => json!({ "type": "string", "minLength": 1 }),
            Self::Array { items, .. } => json!({
                "type": "array",
                "minItems": 1,
                "items": items.to_json_schema(),
            }),
            Self::Object { fields, .. } => {
                let properties: Map<String, Value> = fields
                    .iter()
                    .map(|f| (f.name.to_owned(), f.node.to_json_schema()))
                    .collect();
                let required: Vec<&str> = fields.iter().map(|f| f.name).collect();
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                })
            }
        };
        if !self.description().is_empty()
            && let Some(obj) = out.as_object_mut()
        {
            obj.insert("description".into(), Value::from(self.description()));
        }
        out
    }

    fn validate(&self, value: &Value, path: &str, violations: &mut Vec<Violation>) {
        match self {
            Self::String { .. } => match value.as_str() {
                Some(s) if s.trim().is_empty() => {
                    violations.push(Violation::new(path, "must not be blank"));
                }
                Some(_) => {}
                None => violations.push(Violation::new(
                    path,
                    format!("expected string, found {}", type_name(value)),
                )),
            },
            Self::Array { items, .. } => match value.as_array() {
                Some(arr) if arr.is_empty() => {
                    violations.push(Violation::new(path, "must not be empty"));
                }
                Some(arr) => {
                    for (i, item) in arr.iter().enumerate() {
                        items.validate(item, &format!("{path}[{i}]"), violations);
                    }
                }
                None => violations.push(Violation::new(
                    path,
                    format!("expected array, found {}", type_name(value)),
                )),
            },
            Self::Object { fields, .. } => {
                let Some(obj) = value.as_object() else {
                    violations.push(Violation::new(
                        path,
                        format!("expected object, found {}", type_name(value)),
                    ));
                    return;
                };
                for f in fields {
                    let child = if path == ROOT {
                        f.name.to_owned()
                    } else {
                        format!("{path}.{}", f.name)
                    };
                    match obj.get(f.name) {
                        None | Some(Value::Null) => {
                            violations.push(Violation::new(child, "missing required field"));
                        }
                        Some(v) => f.node.validate(v, &child, violations),
                    }
                }
            }
        }
    }
}

const ROOT: &str = "$";

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaDescription {
    root: SchemaNode,
}

impl SchemaDescription {
    #[must_use]
    pub fn new(root: SchemaNode) -> Self {
        Self { root }
    }

    #[must_use]
    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// The lesson plan record.
    #[must_use]
    pub fn lesson_plan() -> Self {
        let stage = object(
            "",
            vec![
                field("nome", string("Nome da etapa da aula")),
                field("tempo", string("Tempo estimado para a etapa")),
                field("atividades", strings("Lista de atividades da etapa")),
            ],
        );
        Self::new(object(
            "",
            vec![
                field("habilidades_bncc", strings("Habilidades da BNCC relacionadas")),
                field("objetivos_aula", strings("Objetivos específicos da aula")),
                field(
                    "metodologia",
                    object(
                        "Metodologias e justificativas",
                        vec![
                            field(
                                "metodologias_sugeridas",
                                strings("Lista das metodologias apropriadas"),
                            ),
                            field(
                                "justificativa",
                                string("Justificativa para a escolha das metodologias"),
                            ),
                        ],
                    ),
                ),
                field(
                    "materiais_necessarios",
                    strings("Lista de materiais necessários"),
                ),
                field(
                    "estrutura_aula",
                    object(
                        "Estrutura detalhada da aula",
                        vec![
                            field("tempo_total", string("Tempo total da aula")),
                            field("etapas", list("Lista das etapas da aula", stage)),
                        ],
                    ),
                ),
                field(
                    "avaliacao",
                    object(
                        "Formas e critérios de avaliação",
                        vec![
                            field("tipos", strings("Tipos de avaliação")),
                            field("criterios", strings("Critérios de avaliação")),
                        ],
                    ),
                ),
                field(
                    "para_saber_mais",
                    strings("Informações complementares e curiosidades"),
                ),
            ],
        ))
    }

    #[must_use]
    pub fn json_schema(&self) -> Value {
        self.root.to_json_schema()
    }

    /// Instructions appended to the prompt telling the model how to shape its answer.
    #[must_use]
    pub fn format_instructions(&self) -> String {
        format!(
            "The output should be formatted as a JSON instance that conforms to the JSON schema below.\n\
             \n\
             As an example, for the schema {{\"properties\": {{\"foo\": {{\"title\": \"Foo\", \"description\": \"a list of strings\", \"type\": \"array\", \"items\": {{\"type\": \"string\"}}}}}}, \"required\": [\"foo\"]}}\n\
             the object {{\"foo\": [\"bar\", \"baz\"]}} is a well-formatted instance of the schema. \
             The object {{\"properties\": {{\"foo\": [\"bar\", \"baz\"]}}}} is not well-formatted.\n\
             \n\
             Every list must contain at least one item and every text field must be filled in. \
             Answer with the JSON object only.\n\
             \n\
             Here is the output schema:\n```\n{}\n```",
            self.json_schema()
        )
    }

    /// Check `value` against the schema, collecting every violation.
    ///
    /// # Errors
    ///
    /// Returns `SchemaValidationError` listing all violations found.
    pub fn validate(&self, value: &Value) -> Result<(), SchemaValidationError> {
        let mut violations = Vec::new();
        self.root.validate(value, ROOT, &mut violations);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SchemaValidationError { violations })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_plan() -> Value {
        json!({
            "habilidades_bncc": ["(EF09MA19) Resolver e elaborar problemas que envolvam medidas de volumes de prismas"],
            "objetivos_aula": ["Calcular o volume de prismas"],
            "metodologia": {
                "metodologias_sugeridas": ["Aula expositiva", "Solução de problemas"],
                "justificativa": "Combina exposição com prática"
            },
            "materiais_necessarios": ["Quadro", "Sólidos geométricos"],
            "estrutura_aula": {
                "tempo_total": "100 minutos",
                "etapas": [
                    { "nome": "Introdução", "tempo": "15 minutos", "atividades": ["Apresentar sólidos"] }
                ]
            },
            "avaliacao": { "tipos": ["Formativa"], "criterios": ["Cálculo correto"] },
            "para_saber_mais": ["Pirâmides de Gizé"]
        })
    }

    #[test]
    fn conformant_plan_passes() {
        assert!(SchemaDescription::lesson_plan().validate(&valid_plan()).is_ok());
    }

    #[test]
    fn missing_field_reported_with_path() {
        let mut plan = valid_plan();
        plan.as_object_mut().unwrap().remove("habilidades_bncc");
        let err = SchemaDescription::lesson_plan().validate(&plan).unwrap_err();
        assert_eq!(
            err.violations,
            vec![Violation::new("habilidades_bncc", "missing required field")]
        );
    }

    #[test]
    fn null_counts_as_missing() {
        let mut plan = valid_plan();
        plan["avaliacao"]["tipos"] = Value::Null;
        let err = SchemaDescription::lesson_plan().validate(&plan).unwrap_err();
        assert_eq!(err.violations[0].path, "avaliacao.tipos");
    }

    #[test]
    fn nested_violations_are_all_collected() {
        let mut plan = valid_plan();
        plan["estrutura_aula"]["etapas"][0]["atividades"] = json!([]);
        plan["metodologia"]["justificativa"] = json!("   ");
        plan["para_saber_mais"] = json!("not a list");
        let err = SchemaDescription::lesson_plan().validate(&plan).unwrap_err();
        let paths: Vec<&str> = err.violations.iter().map(|v| v.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "metodologia.justificativa",
                "estrutura_aula.etapas[0].atividades",
                "para_saber_mais",
            ]
        );
        assert_eq!(err.violations[2].message, "expected array, found string");
    }

    #[test]
    fn non_object_root_rejected() {
        let err = SchemaDescription::lesson_plan()
            .validate(&json!([1, 2]))
            .unwrap_err();
        assert_eq!(err.violations[0].path, "$");
    }

    #[test]
    fn extra_fields_are_tolerated() {
        let mut plan = valid_plan();
        plan["observacoes"] = json!("extra");
        assert!(SchemaDescription::lesson_plan().validate(&plan).is_ok());
    }

    #[test]
    fn json_schema_marks_everything_required() {
        let schema = SchemaDescription::lesson_plan().json_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 7);
        assert_eq!(schema["properties"]["habilidades_bncc"]["minItems"], 1);
        assert_eq!(
            schema["properties"]["estrutura_aula"]["properties"]["etapas"]["items"]["required"],
            json!(["nome", "tempo", "atividades"])
        );
    }

    #[test]
    fn format_instructions_embed_schema() {
        let text = SchemaDescription::lesson_plan().format_instructions();
        assert!(text.contains("Here is the output schema:"));
        assert!(text.contains("habilidades_bncc"));
        assert!(text.contains("Habilidades da BNCC relacionadas"));
    }
}
