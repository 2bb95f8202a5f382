use aula_llm::LlmProvider;

use crate::context::PipelineContext;
use crate::error::PipelineError;
use crate::generator::PromptFields;
use crate::plan::LessonPlan;
use crate::request::LessonPlanRequest;

/// Where a planning run currently is. Transitions only move forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerState {
    Retrieving,
    Generating { skills: String },
    Done(LessonPlan),
}

impl PlannerState {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Retrieving => "retrieving",
            Self::Generating { .. } => "generating",
            Self::Done(_) => "done",
        }
    }
}

#[must_use]
pub fn retrieval_query(request: &LessonPlanRequest) -> String {
    format!(
        "Quais são as habilidades da BNCC relacionadas ao tema '{}' para alunos do {}?",
        request.tema_conteudo, request.publico
    )
}

/// Retrieve curriculum skills, then generate the plan.
pub struct Planner<'a, P> {
    ctx: &'a PipelineContext<P>,
}

impl<'a, P: LlmProvider> Planner<'a, P> {
    #[must_use]
    pub fn new(ctx: &'a PipelineContext<P>) -> Self {
        Self { ctx }
    }

    /// # Errors
    ///
    /// Returns `InvalidRequest` for a malformed request, otherwise whatever the
    /// retrieval or generation step failed with.
    pub async fn plan(&self, request: &LessonPlanRequest) -> Result<LessonPlan, PipelineError> {
        request.validate()?;

        let mut state = PlannerState::Retrieving;
        loop {
            state = match state {
                PlannerState::Retrieving => {
                    let skills = self.ctx.retriever().answer(&retrieval_query(request)).await?;
                    PlannerState::Generating { skills }
                }
                PlannerState::Generating { skills } => {
                    let fields = PromptFields::for_request(request, &skills);
                    PlannerState::Done(self.ctx.generator().generate_plan(&fields).await?)
                }
                PlannerState::Done(plan) => return Ok(plan),
            };
            tracing::debug!(state = state.name(), "planner advanced");
        }
    }

    /// [`Planner::plan`] bounded by the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Timeout` when the whole run exceeds the limit.
    pub async fn plan_with_timeout(
        &self,
        request: &LessonPlanRequest,
    ) -> Result<LessonPlan, PipelineError> {
        let limit = self.ctx.settings().request_timeout;
        let started = std::time::Instant::now();
        let result = tokio::time::timeout(limit, self.plan(request))
            .await
            .map_err(|_| PipelineError::Timeout {
                stage: "lesson plan request".into(),
                after: limit,
            })?;
        match &result {
            Ok(_) => tracing::info!(
                tema = %request.tema_conteudo,
                elapsed_ms = started.elapsed().as_millis(),
                "lesson plan generated"
            ),
            Err(e) => tracing::warn!(kind = %e.kind(), error = %e, "lesson plan failed"),
        }
        result
    }
}
