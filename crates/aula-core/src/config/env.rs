use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_llm();
        self.apply_env_overrides_pipeline();
        self.apply_env_overrides_gateway();
    }

    fn apply_env_overrides_llm(&mut self) {
        if let Ok(v) = std::env::var("AULA_LLM_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.to_lowercase())) {
                self.llm.provider = kind;
            } else {
                tracing::warn!("ignoring invalid AULA_LLM_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("AULA_LLM_BASE_URL") {
            self.llm.base_url = v;
        }
        if let Ok(v) = std::env::var("AULA_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("AULA_LLM_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }
        if let Ok(v) = std::env::var("AULA_LLM_TEMPERATURE")
            && let Ok(t) = v.parse::<f32>()
        {
            self.llm.temperature = t;
        }
    }

    fn apply_env_overrides_pipeline(&mut self) {
        if let Ok(v) = std::env::var("AULA_INDEX_PATH") {
            self.index.path = v.into();
        }
        if let Ok(v) = std::env::var("AULA_CORPUS_DIR") {
            self.index.corpus_dir = v.into();
        }
        if let Ok(v) = std::env::var("AULA_CHUNK_SIZE")
            && let Ok(n) = v.parse::<usize>()
        {
            self.index.chunk_size = n;
        }
        if let Ok(v) = std::env::var("AULA_CHUNK_OVERLAP")
            && let Ok(n) = v.parse::<usize>()
        {
            self.index.chunk_overlap = n;
        }
        if let Ok(v) = std::env::var("AULA_TOP_K")
            && let Ok(k) = v.parse::<usize>()
        {
            self.retrieval.top_k = k;
        }
        if let Ok(v) = std::env::var("AULA_GENERATION_MAX_RETRIES")
            && let Ok(n) = v.parse::<u32>()
        {
            self.generation.max_retries = n;
        }
        if let Ok(v) = std::env::var("AULA_TIMEOUT_LLM")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.llm_seconds = secs;
        }
        if let Ok(v) = std::env::var("AULA_TIMEOUT_EMBEDDING")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.embedding_seconds = secs;
        }
        if let Ok(v) = std::env::var("AULA_TIMEOUT_REQUEST")
            && let Ok(secs) = v.parse::<u64>()
        {
            self.timeouts.request_seconds = secs;
        }
    }

    fn apply_env_overrides_gateway(&mut self) {
        if let Ok(v) = std::env::var("AULA_GATEWAY_BIND") {
            self.gateway.bind = v;
        }
        if let Ok(v) = std::env::var("AULA_GATEWAY_PORT")
            && let Ok(port) = v.parse::<u16>()
        {
            self.gateway.port = port;
        }
        if let Ok(v) = std::env::var("AULA_GATEWAY_TOKEN") {
            self.gateway.auth_token = Some(v);
        }
    }
}
