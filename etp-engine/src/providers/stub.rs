//! Deterministic in-crate collaborators. The generation stub answers with the
//! same heterogeneous payload shapes a real service produces (fenced JSON for
//! suggestions, a structured mapping for documents) so the full normalizer
//! path is exercised; the retrieval stub scores an embedded corpus of
//! procurement norms by token overlap.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde_json::{json, Value};

use super::{GenerationService, ProviderError, RetrievalService, RetrievedPassage};
use crate::text;
use crate::types::Stage;

/// Keyword-templated generation with no external calls
pub struct StubGenerationService {
    suggestion_count: usize,
}

impl StubGenerationService {
    pub fn new(suggestion_count: usize) -> Self {
        Self { suggestion_count }
    }

    fn suggestion_templates(necessity: &str) -> Vec<(String, String)> {
        let folded = text::fold(necessity);
        let mut out: Vec<(String, String)> = Vec::new();

        if ["servico", "manutencao", "suporte", "gestao", "operacao"]
            .iter()
            .any(|w| folded.contains(w))
        {
            out.push((
                "Equipe técnica qualificada e dimensionada para a demanda".to_string(),
                format!("Recursos humanos adequados para {necessity}"),
            ));
            out.push((
                "Acordo de nível de serviço com disponibilidade mínima de 95%".to_string(),
                "Garantia de continuidade operacional".to_string(),
            ));
        }
        if ["equipamento", "aeronave", "veiculo", "frota", "material", "maquina"]
            .iter()
            .any(|w| folded.contains(w))
        {
            out.push((
                "Garantia mínima de 12 meses para os equipamentos fornecidos".to_string(),
                "Proteção contra defeitos de fabricação".to_string(),
            ));
            out.push((
                "Manutenção preventiva e corretiva incluída no contrato".to_string(),
                format!("Disponibilidade contínua para {necessity}"),
            ));
        }
        if ["software", "sistema", "licenca", "plataforma", "dados"]
            .iter()
            .any(|w| folded.contains(w))
        {
            out.push((
                "Conformidade com a LGPD no tratamento de dados".to_string(),
                "Adequação legal obrigatória".to_string(),
            ));
            out.push((
                "Integração com os sistemas corporativos existentes".to_string(),
                "Continuidade dos processos internos".to_string(),
            ));
        }

        out.push((
            format!("Atendimento integral à necessidade de {necessity}"),
            "Requisito essencial de escopo".to_string(),
        ));
        out.push((
            "Comprovação de capacidade técnica em contratos similares".to_string(),
            "Mitigação de risco de inexecução".to_string(),
        ));
        out.push((
            "Prazo de implantação compatível com o cronograma do órgão".to_string(),
            "Alinhamento com o planejamento institucional".to_string(),
        ));
        out.push((
            "Suporte em horário comercial com prazo de resposta definido".to_string(),
            "Tratamento tempestivo de ocorrências".to_string(),
        ));

        out
    }

    fn document(
        necessity: &str,
        context: &[RetrievedPassage],
        answers: &IndexMap<String, String>,
    ) -> String {
        let answer = |key: &str| -> &str {
            answers.get(key).map(String::as_str).unwrap_or("não informado")
        };
        let requirements: Vec<&RetrievedPassage> =
            context.iter().filter(|p| p.section == "requisitos").collect();
        let norms: Vec<&RetrievedPassage> =
            context.iter().filter(|p| p.section != "requisitos").collect();

        let mut md = String::new();
        md.push_str("# ESTUDO TÉCNICO PRELIMINAR (ETP)\n\n");
        md.push_str("## 1. Descrição da Necessidade\n\n");
        md.push_str(necessity);
        md.push_str("\n\n## 2. Requisitos da Contratação\n\n");
        if requirements.is_empty() {
            md.push_str("Requisitos pendentes de definição.\n");
        } else {
            for (i, req) in requirements.iter().enumerate() {
                md.push_str(&format!("{}. {}\n", i + 1, req.text));
            }
        }
        md.push_str("\n## 3. Estratégia de Contratação\n\n");
        md.push_str(answer("solution_path"));
        md.push_str("\n\n## 4. Previsão no PCA\n\n");
        md.push_str(answer("pca"));
        md.push_str("\n\n## 5. Base Legal\n\n");
        md.push_str(answer("legal_norms"));
        if !norms.is_empty() {
            md.push_str("\n\nReferências do corpus:\n");
            for norm in norms {
                md.push_str(&format!("- {} ({})\n", norm.text, norm.section));
            }
        }
        md.push_str("\n## 6. Quantitativo e Valor Estimado\n\n");
        md.push_str(answer("quant_value"));
        md.push_str("\n\n## 7. Parcelamento da Contratação\n\n");
        md.push_str(answer("parcelamento"));
        md.push_str("\n\n## 8. Conclusão\n\n");
        md.push_str(&format!(
            "A contratação destinada a {necessity} mostra-se viável nos termos levantados neste estudo."
        ));
        md
    }
}

#[async_trait]
impl GenerationService for StubGenerationService {
    async fn generate(
        &self,
        stage: Stage,
        necessity: &str,
        context: &[RetrievedPassage],
        answers: &IndexMap<String, String>,
    ) -> Result<Value, ProviderError> {
        match stage {
            Stage::GenerateEtp | Stage::Preview => Ok(json!({
                "document": Self::document(necessity, context, answers),
            })),
            _ => {
                let items: Vec<Value> = Self::suggestion_templates(necessity)
                    .into_iter()
                    .take(self.suggestion_count)
                    .map(|(text, justification)| {
                        json!({"text": text, "justification": justification})
                    })
                    .collect();
                let body = json!({
                    "suggested_requirements": items,
                    "consultative_message": format!(
                        "Baseado na sua necessidade, sugiro estes requisitos para \"{necessity}\"."
                    ),
                });
                // Fenced string on purpose: real services answer this way and
                // the normalizer must cope with it.
                Ok(Value::String(format!("```json\n{body}\n```")))
            }
        }
    }
}

struct CorpusEntry {
    id: &'static str,
    section: &'static str,
    text: &'static str,
    keywords: &'static [&'static str],
    /// Base relevance at the legal-norms stage regardless of the necessity
    baseline: f64,
}

const CORPUS: &[CorpusEntry] = &[
    CorpusEntry {
        id: "lei-14133-2021",
        section: "Lei 14.133/2021, art. 18",
        text: "Lei 14.133/2021 (Nova Lei de Licitações) — base geral para contratações públicas e elaboração do ETP",
        keywords: &["contratacao", "licitacao", "compra", "aquisicao"],
        baseline: 0.9,
    },
    CorpusEntry {
        id: "decreto-11462-2023",
        section: "Decreto 11.462/2023",
        text: "Decreto 11.462/2023 — regulamenta pregão eletrônico e contratação direta",
        keywords: &["pregao", "contratacao", "direta"],
        baseline: 0.7,
    },
    CorpusEntry {
        id: "in-seges-65-2021",
        section: "IN SEGES 65/2021",
        text: "IN SEGES 65/2021 — gestão de contratos administrativos federais",
        keywords: &["gestao", "contrato", "servico", "fiscalizacao"],
        baseline: 0.6,
    },
    CorpusEntry {
        id: "in-seges-58-2022",
        section: "IN SEGES 58/2022",
        text: "IN SEGES 58/2022 — elaboração dos estudos técnicos preliminares",
        keywords: &["etp", "estudo", "planejamento"],
        baseline: 0.5,
    },
    CorpusEntry {
        id: "abnt-nbr",
        section: "Normas técnicas ABNT",
        text: "Normas técnicas ABNT específicas do objeto (equipamentos e materiais)",
        keywords: &["equipamento", "material", "aeronave", "veiculo", "maquina", "tecnica"],
        baseline: 0.0,
    },
    CorpusEntry {
        id: "lgpd",
        section: "Lei 13.709/2018 (LGPD)",
        text: "Lei 13.709/2018 (LGPD) — tratamento de dados pessoais em sistemas e plataformas",
        keywords: &["software", "sistema", "dados", "plataforma", "licenca"],
        baseline: 0.0,
    },
];

/// Retrieval over the embedded corpus, scored by normalized token overlap
pub struct StaticRetrievalService {
    top_k: usize,
}

impl StaticRetrievalService {
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }

    fn overlap(tokens: &[String], keywords: &[&str]) -> f64 {
        if keywords.is_empty() {
            return 0.0;
        }
        let hits = keywords.iter().filter(|k| tokens.iter().any(|t| t == *k)).count();
        hits as f64 / keywords.len() as f64
    }
}

#[async_trait]
impl RetrievalService for StaticRetrievalService {
    async fn retrieve_for_stage(
        &self,
        stage: Stage,
        necessity: &str,
    ) -> Result<Vec<RetrievedPassage>, ProviderError> {
        let tokens: Vec<String> = text::fold(necessity)
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(String::from)
            .collect();

        let mut scored: Vec<RetrievedPassage> = CORPUS
            .iter()
            .filter_map(|entry| {
                let mut score = Self::overlap(&tokens, entry.keywords);
                if stage == Stage::AskLegalNorms {
                    score = score.max(entry.baseline);
                }
                (score > 0.0).then(|| RetrievedPassage {
                    id: entry.id.to_string(),
                    section: entry.section.to_string(),
                    text: entry.text.to_string(),
                    score,
                })
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(self.top_k);
        Ok(scored)
    }
}
