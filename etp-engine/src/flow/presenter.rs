//! Response composition: every assistant-facing message the engine produces.
//! All dialogue text is Portuguese prose; rejections and failures read as a
//! natural continuation of the conversation, never as a technical error.

use itertools::Itertools;

use super::answers::SOLUTION_PATHS;
use crate::providers::RetrievedPassage;
use crate::types::{Requirement, Session, Stage};

pub fn requirements_block(requirements: &[Requirement]) -> String {
    requirements
        .iter()
        .map(|r| format!("{} — {}", r.id, r.text))
        .join("\n")
}

pub fn solution_options() -> String {
    SOLUTION_PATHS
        .iter()
        .enumerate()
        .map(|(i, (title, description))| format!("{}. **{}**: {}", i + 1, title, description))
        .join("\n")
}

/// Suggested requirements listing shown on entry to `suggest_requirements`
pub fn suggestions(requirements: &[Requirement], consultative_message: &str) -> String {
    let lead = if consultative_message.trim().is_empty() {
        "Baseado na sua necessidade, sugiro estes requisitos:"
    } else {
        consultative_message.trim()
    };
    format!(
        "{lead}\n\n{}\n\nSe quiser ajustar algo, me diga naturalmente o que mudar \
         (por exemplo \"remover 2 e 4\" ou \"trocar 3: novo texto\"). \
         Caso contrário, posso seguir para a estratégia de contratação.",
        requirements_block(requirements)
    )
}

/// Prompt shown on entry to a stage (advance or restating after a vague turn)
pub fn stage_prompt(stage: Stage, session: &Session) -> String {
    match stage {
        Stage::CollectNeed => {
            "Olá! Para começar, me descreva qual a necessidade desta contratação.".to_string()
        }
        Stage::SuggestRequirements | Stage::RefineRequirements => {
            if session.requirements.is_empty() {
                "Vou preparar os requisitos para você. Um momento...".to_string()
            } else {
                format!(
                    "Estes são os requisitos atuais:\n\n{}\n\nQuer ajustar algum deles ou podemos seguir?",
                    requirements_block(&session.requirements)
                )
            }
        }
        Stage::ConfirmRequirements => format!(
            "Lista consolidada:\n\n{}\n\nConfirma estes requisitos? A partir daqui a lista fica fechada.",
            requirements_block(&session.requirements)
        ),
        Stage::RecommendSolutionPath => {
            let need = session.necessity.as_deref().unwrap_or("sua necessidade");
            format!(
                "Agora vamos definir a melhor estratégia de contratação para \"{need}\". \
                 Posso sugerir algumas opções:\n\n{}\n\nQual dessas faz mais sentido para o seu caso? \
                 Responda pelo número ou pelo nome.",
                solution_options()
            )
        }
        Stage::AskPca => "Sobre o PCA (Plano de Contratações Anual): essa demanda já aparece no seu \
                          planejamento deste ano? Se não tiver certeza, pode responder \"não sei\"."
            .to_string(),
        Stage::AskLegalNorms => "Normas e base legal: quais normas se aplicam a esta contratação? \
                                 Posso sugerir um pacote inicial típico do setor."
            .to_string(),
        Stage::AskQuantValue => "Sobre quantitativo e valor: consegue estimar uma ordem de grandeza? \
                                 (ex.: \"10 unidades, R$ 500 mil por ano\")"
            .to_string(),
        Stage::AskParcelamento => "Sobre parcelamento: faz sentido dividir a contratação em lotes ou \
                                   fases? Pode responder sim, não, ou descrever a divisão."
            .to_string(),
        Stage::ConfirmSummary => summary(session),
        Stage::GenerateEtp => "Tudo pronto. Quando quiser, diga \"pode gerar\" e eu preparo a prévia \
                               do ETP com as informações coletadas."
            .to_string(),
        Stage::Preview => match &session.generated_document {
            Some(document) => format!(
                "Aqui está a prévia do ETP gerado:\n\n{document}\n\nSe estiver tudo certo, confirme \
                 para finalizar; se preferir, diga \"pode gerar\" para regenerar."
            ),
            None => "A prévia ainda não foi gerada. Diga \"pode gerar\" para prepará-la.".to_string(),
        },
        Stage::Finalize => "ETP finalizado! O documento está pronto para exportação. Se surgir uma \
                            nova necessidade, é só me dizer \"nova necessidade\"."
            .to_string(),
    }
}

/// Structured recap shown at `confirm_summary`
pub fn summary(session: &Session) -> String {
    let answer = |key: &str| session.answer(key).unwrap_or("não informado").to_string();
    let requirements = if session.requirements.is_empty() {
        "requisitos pendentes".to_string()
    } else {
        format!("{} requisitos definidos", session.requirements.len())
    };
    format!(
        "Pronto! Aqui está o resumo do ETP:\n\n\
         **Necessidade:** {}\n\
         **Requisitos:** {}\n\
         **Estratégia de contratação:** {}\n\
         **PCA:** {}\n\
         **Normas legais:** {}\n\
         **Quantitativo/Valor:** {}\n\
         **Parcelamento:** {}\n\n\
         Tudo certo? Se sim, diga \"pode gerar\" que eu preparo a prévia do documento.",
        session.necessity.as_deref().unwrap_or("não informado"),
        requirements,
        answer("solution_path"),
        answer("pca"),
        answer("legal_norms"),
        answer("quant_value"),
        answer("parcelamento"),
    )
}

/// Corpus suggestions shown on entry to `ask_legal_norms`. An empty retrieval
/// yields an explicit not-found line rather than invented citations.
pub fn norm_suggestions(passages: &[RetrievedPassage]) -> String {
    if passages.is_empty() {
        return "Não encontrei normas aplicáveis no corpus para este objeto. Se souber de alguma \
                norma específica do seu órgão, me diga; caso contrário, responda \"não sei\"."
            .to_string();
    }
    let listing = passages
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {}", i + 1, p.text))
        .join("\n");
    format!(
        "Encontrei estas normas no corpus que costumam se aplicar:\n\n{listing}\n\n\
         Quais dessas fazem sentido incluir? Ou tem alguma norma específica do seu órgão?"
    )
}

/// Clarification for an unmatched turn, per stage
pub fn unclear(stage: Stage) -> String {
    match stage {
        Stage::CollectNeed => "Não entendi. Me descreva em uma frase qual a necessidade desta \
                               contratação (ex.: \"gestão de frota de aeronaves\")."
            .to_string(),
        Stage::SuggestRequirements | Stage::RefineRequirements => {
            "Não entendi o ajuste. Você pode dizer, por exemplo, \"remover 2 e 4\", \
             \"trocar 3: novo texto\", \"adicionar: novo requisito\" ou confirmar com \"ok\"."
                .to_string()
        }
        Stage::ConfirmRequirements => "Só preciso de uma confirmação: a lista de requisitos está boa \
                                       assim? Responda \"sim\" para seguir."
            .to_string(),
        Stage::RecommendSolutionPath => "Não identifiquei a estratégia. Responda pelo número (1 a 5) \
                                         ou pelo nome de uma das opções listadas."
            .to_string(),
        Stage::AskPca | Stage::AskLegalNorms | Stage::AskQuantValue | Stage::AskParcelamento => {
            "Não entendi a resposta. Pode reformular? Se não tiver a informação, responda \"não sei\" \
             que eu registro como não informado."
                .to_string()
        }
        Stage::ConfirmSummary => "Não entendi. Se o resumo estiver correto, diga \"pode gerar\" para \
                                  eu preparar a prévia; para recomeçar, diga \"nova necessidade\"."
            .to_string(),
        Stage::GenerateEtp => "Para gerar a prévia do ETP preciso da confirmação explícita: diga \
                               \"pode gerar\"."
            .to_string(),
        Stage::Preview => "Não entendi. Confirme com \"ok\" para finalizar ou diga \"pode gerar\" \
                           para regenerar a prévia."
            .to_string(),
        Stage::Finalize => "Este ETP já foi finalizado. Se quiser começar outro, diga \"nova \
                            necessidade\"."
            .to_string(),
    }
}

/// Structural edit received after the list was locked in
pub fn stage_mismatch(stage: Stage) -> String {
    format!(
        "A lista de requisitos já foi confirmada e não pode mais ser editada nesta etapa \
         ({stage}). Se precisar revisá-la, diga \"nova necessidade\" para recomeçar."
    )
}

/// Retry-oriented response for a collaborator failure; the stage stays put
pub fn service_failure(stage: Stage) -> String {
    log::warn!("external service failure at stage {stage}");
    "Ocorreu um erro técnico ao consultar o sistema. Vou permanecer nesta etapa; quando quiser \
     tentar novamente, é só repetir."
        .to_string()
}
