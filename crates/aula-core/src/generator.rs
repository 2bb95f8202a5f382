use std::collections::BTreeMap;

use aula_llm::provider::with_timeout;
use aula_llm::{ChatOptions, LlmProvider, Message};
use serde_json::Value;

use crate::context::PipelineContext;
use crate::error::{PipelineError, SchemaValidationError, Violation};
use crate::plan::LessonPlan;
use crate::request::LessonPlanRequest;
use crate::schema::SchemaDescription;

const FORMAT_INSTRUCTIONS: &str = "format_instructions";

pub const LESSON_PLAN_TEMPLATE: &str = r#"Crie um plano de aula completo e detalhado sobre o tema "{tema_conteudo}", para alunos do {publico}, considerando {tempo_aula}.

Habilidades BNCC encontradas:
{habilidades_bncc}

{objetivos_info}
{recursos_info}{habilidades_info}

Baseie-se nas seguintes metodologias disponíveis:
- Aplicação de exercícios
- Aula expositiva
- Dramatização
- Estudo de caso
- Estudo dirigido
- Estudo de texto
- Mapa conceitual
- Painel
- Pesquisa de campo
- Seminário
- Solução de problemas

{format_instructions}
"#;

/// Named values substituted into a prompt template.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptFields(BTreeMap<String, String>);

impl PromptFields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    /// Fields for the lesson plan template. Optional request fields that were not
    /// provided render as empty blocks.
    #[must_use]
    pub fn for_request(request: &LessonPlanRequest, habilidades_bncc: &str) -> Self {
        let optional = |label: &str, value: Option<&String>| {
            value.map_or_else(String::new, |v| format!("{label}: {v}"))
        };
        Self::new()
            .with("tema_conteudo", &request.tema_conteudo)
            .with("publico", &request.publico)
            .with("tempo_aula", &request.tempo_aula)
            .with("habilidades_bncc", habilidades_bncc)
            .with(
                "objetivos_info",
                optional("Objetivos específicos", request.objetivos.as_ref()),
            )
            .with(
                "recursos_info",
                optional("Recursos disponíveis", request.recursos_didaticos.as_ref()),
            )
            .with(
                "habilidades_info",
                request
                    .habilidades
                    .as_ref()
                    .map_or_else(String::new, |h| format!("\nHabilidades indicadas pelo professor: {h}")),
            )
    }
}

/// Substitute `{name}` placeholders. `format_instructions` comes from the schema,
/// everything else from `fields`.
///
/// # Errors
///
/// Returns `PipelineError::Configuration` naming any placeholder without a value.
pub fn render(
    template: &str,
    fields: &PromptFields,
    format_instructions: &str,
) -> Result<String, PipelineError> {
    let mut out = String::with_capacity(template.len() + format_instructions.len());
    let mut missing = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let name_len = after
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(after.len());
        if name_len > 0 && after[name_len..].starts_with('}') {
            let name = &after[..name_len];
            if name == FORMAT_INSTRUCTIONS {
                out.push_str(format_instructions);
            } else if let Some(value) = fields.get(name) {
                out.push_str(value);
            } else {
                missing.push(name.to_owned());
            }
            rest = &after[name_len + 1..];
        } else {
            out.push('{');
            rest = after;
        }
    }
    out.push_str(rest);

    if missing.is_empty() {
        Ok(out)
    } else {
        Err(PipelineError::Configuration(format!(
            "prompt template fields without a value: {}",
            missing.join(", ")
        )))
    }
}

/// Drop a surrounding markdown code fence, if any.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.strip_suffix("```").unwrap_or(body).trim_end();
    // An info string such as `json` may sit on the opening line or share it with the value.
    let info_len = body
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(body.len());
    let rest = body[info_len..].trim_start();
    if rest.starts_with(['{', '[']) {
        rest
    } else {
        body.trim()
    }
}

/// Decode and validate a raw model answer.
///
/// # Errors
///
/// Malformed JSON is reported as a violation at the root, like any other schema failure.
pub fn parse_output(raw: &str, schema: &SchemaDescription) -> Result<Value, SchemaValidationError> {
    let value: Value = serde_json::from_str(strip_code_fence(raw)).map_err(|e| SchemaValidationError {
        violations: vec![Violation::new("$", format!("invalid JSON: {e}"))],
    })?;
    schema.validate(&value)?;
    Ok(value)
}

fn correction(base_prompt: &str, err: &SchemaValidationError) -> String {
    format!(
        "{base_prompt}\n\nSua resposta anterior era inválida; motivos: {err}. \
         Responda novamente apenas com o objeto JSON corrigido, seguindo o esquema."
    )
}

/// Renders the lesson plan prompt, calls the model, and validates the answer.
pub struct Generator<'a, P> {
    ctx: &'a PipelineContext<P>,
    template: &'a str,
}

impl<'a, P: LlmProvider> Generator<'a, P> {
    #[must_use]
    pub fn new(ctx: &'a PipelineContext<P>) -> Self {
        Self {
            ctx,
            template: LESSON_PLAN_TEMPLATE,
        }
    }

    #[must_use]
    pub fn with_template(mut self, template: &'a str) -> Self {
        self.template = template;
        self
    }

    /// Generate a value conforming to `schema`.
    ///
    /// After a validation failure the prompt is resent with the reasons appended,
    /// up to `max_retries` times.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` for an unrenderable template, `Generation` or
    /// `Timeout` for provider failures, and `SchemaValidation` once retries are spent.
    pub async fn generate(
        &self,
        fields: &PromptFields,
        schema: &SchemaDescription,
    ) -> Result<Value, PipelineError> {
        let base = render(self.template, fields, &schema.format_instructions())?;
        let max_retries = self.ctx.settings().max_retries;
        let mut prompt = base.clone();
        let mut attempt = 0u32;

        loop {
            let raw = self.call(&prompt).await?;
            match parse_output(&raw, schema) {
                Ok(value) => {
                    tracing::debug!(attempt, "generation output accepted");
                    return Ok(value);
                }
                Err(err) if attempt < max_retries => {
                    tracing::warn!(attempt, violations = err.violations.len(), error = %err, "generation output rejected, retrying");
                    prompt = correction(&base, &err);
                    attempt += 1;
                }
                Err(err) => {
                    tracing::warn!(attempt, error = %err, "generation output rejected, giving up");
                    return Err(err.into());
                }
            }
        }
    }

    /// # Errors
    ///
    /// See [`Generator::generate`].
    pub async fn generate_plan(&self, fields: &PromptFields) -> Result<LessonPlan, PipelineError> {
        let value = self.generate(fields, &SchemaDescription::lesson_plan()).await?;
        serde_json::from_value(value).map_err(|e| {
            SchemaValidationError {
                violations: vec![Violation::new("$", e.to_string())],
            }
            .into()
        })
    }

    async fn call(&self, prompt: &str) -> Result<String, PipelineError> {
        let provider = self.ctx.provider();
        let settings = self.ctx.settings();
        let messages = [Message::user(prompt)];
        let options = ChatOptions::with_temperature(settings.temperature).json();
        with_timeout(
            provider.name(),
            settings.llm_timeout,
            provider.chat(&messages, &options),
        )
        .await
        .map_err(PipelineError::generation)
    }
}
