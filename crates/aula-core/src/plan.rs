use serde::{Deserialize, Serialize};

/// A generated lesson plan. Field names are the wire names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonPlan {
    pub habilidades_bncc: Vec<String>,
    pub objetivos_aula: Vec<String>,
    pub metodologia: Methodology,
    pub materiais_necessarios: Vec<String>,
    pub estrutura_aula: LessonStructure,
    pub avaliacao: Assessment,
    pub para_saber_mais: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Methodology {
    pub metodologias_sugeridas: Vec<String>,
    pub justificativa: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonStructure {
    pub tempo_total: String,
    pub etapas: Vec<LessonStage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonStage {
    pub nome: String,
    pub tempo: String,
    pub atividades: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assessment {
    pub tipos: Vec<String>,
    pub criterios: Vec<String>,
}
