use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

/// What an educator asks for.
///
/// Optional fields are `None` when not provided. A provided but blank optional
/// field is rejected by [`LessonPlanRequest::validate`], not treated as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonPlanRequest {
    pub tema_conteudo: String,
    pub publico: String,
    pub tempo_aula: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objetivos: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recursos_didaticos: Option<String>,
    /// Skills the educator already wants covered, in addition to the retrieved ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub habilidades: Option<String>,
}

impl LessonPlanRequest {
    pub fn new(
        tema_conteudo: impl Into<String>,
        publico: impl Into<String>,
        tempo_aula: impl Into<String>,
    ) -> Self {
        Self {
            tema_conteudo: tema_conteudo.into(),
            publico: publico.into(),
            tempo_aula: tempo_aula.into(),
            objetivos: None,
            recursos_didaticos: None,
            habilidades: None,
        }
    }

    #[must_use]
    pub fn with_objetivos(mut self, objetivos: impl Into<String>) -> Self {
        self.objetivos = Some(objetivos.into());
        self
    }

    #[must_use]
    pub fn with_recursos(mut self, recursos: impl Into<String>) -> Self {
        self.recursos_didaticos = Some(recursos.into());
        self
    }

    #[must_use]
    pub fn with_habilidades(mut self, habilidades: impl Into<String>) -> Self {
        self.habilidades = Some(habilidades.into());
        self
    }

    /// # Errors
    ///
    /// Returns `PipelineError::InvalidRequest` naming every blank field.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let required = [
            ("tema_conteudo", Some(&self.tema_conteudo)),
            ("publico", Some(&self.publico)),
            ("tempo_aula", Some(&self.tempo_aula)),
        ];
        let optional = [
            ("objetivos", self.objetivos.as_ref()),
            ("recursos_didaticos", self.recursos_didaticos.as_ref()),
            ("habilidades", self.habilidades.as_ref()),
        ];

        let blank: Vec<&str> = required
            .iter()
            .chain(optional.iter())
            .filter(|(_, v)| v.is_some_and(|s| s.trim().is_empty()))
            .map(|(name, _)| *name)
            .collect();

        if blank.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::InvalidRequest(format!(
                "fields must not be blank: {}",
                blank.join(", ")
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn minimal_request_is_valid() {
        let req = LessonPlanRequest::new("Prismas e pirâmides", "9º ano", "2 aulas de 50 minutos");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn blank_required_field_rejected() {
        let req = LessonPlanRequest::new("  ", "9º ano", "");
        let err = req.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        assert!(err.to_string().contains("tema_conteudo, tempo_aula"));
    }

    #[test]
    fn empty_optional_is_not_absent() {
        let req = LessonPlanRequest::new("a", "b", "c").with_objetivos("");
        let err = req.validate().unwrap_err();
        assert!(err.to_string().contains("objetivos"));
    }

    #[test]
    fn missing_optionals_deserialize_as_none() {
        let req: LessonPlanRequest = serde_json::from_str(
            r#"{"tema_conteudo":"Frações","publico":"6º ano","tempo_aula":"1 aula"}"#,
        )
        .unwrap();
        assert!(req.objetivos.is_none());
        assert!(req.recursos_didaticos.is_none());
        assert!(req.habilidades.is_none());
    }

    #[test]
    fn explicit_null_is_absent_and_empty_string_is_present() {
        let req: LessonPlanRequest = serde_json::from_str(
            r#"{"tema_conteudo":"a","publico":"b","tempo_aula":"c","objetivos":null,"recursos_didaticos":""}"#,
        )
        .unwrap();
        assert!(req.objetivos.is_none());
        assert_eq!(req.recursos_didaticos.as_deref(), Some(""));
        assert!(req.validate().is_err());
    }

    #[test]
    fn absent_optionals_not_serialized() {
        let json = serde_json::to_value(LessonPlanRequest::new("a", "b", "c")).unwrap();
        assert!(json.get("objetivos").is_none());
    }
}
