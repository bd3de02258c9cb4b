//! Localized string table: prompt templates, sign names and fallback
//! paragraphs per language code. Built-in tables can be extended from a JSON
//! file at startup.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::LocaleError;
use crate::subject::{normalize_language_code, ForecastSubject, ZodiacSign};

const DEFAULT_LANGUAGE: &str = "en";

/// Label spellings models emit that no template uses verbatim.
const ECHOED_LABEL_VARIANTS: &[&str] = &["運勢：", "Horoscopo:"];

/// Prompt for one language. `header` may reference `{sun}`, `{rising}` and
/// `{week}`; the prompt ends with `label`, which the sanitizer strips if the
/// model echoes it.
#[derive(Debug, Clone, Deserialize)]
pub struct PromptTemplate {
    pub header: String,
    pub instructions: Vec<String>,
    pub label: String,
}

impl PromptTemplate {
    fn new(header: &str, instructions: &[&str], label: &str) -> Self {
        Self {
            header: header.to_string(),
            instructions: instructions.iter().map(|s| s.to_string()).collect(),
            label: label.to_string(),
        }
    }

    pub fn render(&self, sun: &str, rising: &str, week: u32) -> String {
        let header = self
            .header
            .replace("{sun}", sun)
            .replace("{rising}", rising)
            .replace("{week}", &week.to_string());
        let mut lines = Vec::with_capacity(self.instructions.len() + 2);
        lines.push(header);
        lines.extend(self.instructions.iter().cloned());
        lines.push(self.label.clone());
        lines.join("\n")
    }
}

/// On-disk override format.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LocaleFile {
    prompts: HashMap<String, PromptTemplate>,
    fallbacks: HashMap<String, String>,
    sign_names: HashMap<String, HashMap<ZodiacSign, String>>,
}

pub struct LocaleTable {
    prompts: HashMap<String, PromptTemplate>,
    fallbacks: HashMap<String, String>,
    sign_names: HashMap<String, HashMap<ZodiacSign, String>>,
}

impl LocaleTable {
    pub fn builtin() -> Self {
        let prompts = builtin_prompts()
            .into_iter()
            .map(|(code, t)| (code.to_string(), t))
            .collect();
        let fallbacks = BUILTIN_FALLBACKS
            .iter()
            .map(|(code, text)| (code.to_string(), text.to_string()))
            .collect();
        let sign_names = BUILTIN_SIGN_NAMES
            .iter()
            .map(|(code, names)| {
                let map = ZodiacSign::ALL
                    .iter()
                    .map(|sign| (*sign, names[sign.index()].to_string()))
                    .collect();
                (code.to_string(), map)
            })
            .collect();
        Self {
            prompts,
            fallbacks,
            sign_names,
        }
    }

    /// Built-in tables with entries from `path` layered on top.
    pub fn with_overrides_from_file(path: &Path) -> Result<Self, LocaleError> {
        let content = std::fs::read_to_string(path)?;
        let file: LocaleFile = serde_json::from_str(&content)?;
        let mut table = Self::builtin();
        for (code, template) in file.prompts {
            table.prompts.insert(normalize_language_code(&code), template);
        }
        for (code, text) in file.fallbacks {
            if !text.trim().is_empty() {
                table.fallbacks.insert(normalize_language_code(&code), text);
            }
        }
        for (code, names) in file.sign_names {
            table
                .sign_names
                .entry(normalize_language_code(&code))
                .or_default()
                .extend(names);
        }
        Ok(table)
    }

    pub fn prompt_template(&self, language: &str) -> &PromptTemplate {
        self.prompts
            .get(language)
            .or_else(|| self.prompts.get(DEFAULT_LANGUAGE))
            .unwrap_or_else(|| &*ENGLISH_PROMPT)
    }

    /// Never empty; unknown languages get the English paragraph.
    pub fn fallback_text(&self, language: &str) -> &str {
        self.fallbacks
            .get(language)
            .or_else(|| self.fallbacks.get(DEFAULT_LANGUAGE))
            .map(String::as_str)
            .unwrap_or(ENGLISH_FALLBACK)
    }

    pub fn sign_name(&self, sign: ZodiacSign, language: &str) -> String {
        self.sign_names
            .get(language)
            .and_then(|names| names.get(&sign))
            .or_else(|| self.sign_names.get(DEFAULT_LANGUAGE).and_then(|n| n.get(&sign)))
            .cloned()
            .unwrap_or_else(|| sign.as_str().to_string())
    }

    pub fn build_prompt(&self, subject: &ForecastSubject) -> String {
        let language = subject.language();
        let sun = self.sign_name(subject.sun_sign(), language);
        let rising = self.sign_name(subject.rising_sign(), language);
        self.prompt_template(language)
            .render(&sun, &rising, subject.iso_week())
    }

    /// Every prompt label, for stripping echoed labels from model output.
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.prompts.values().map(|t| t.label.clone()).collect();
        labels.extend(ECHOED_LABEL_VARIANTS.iter().map(|l| l.to_string()));
        labels.sort();
        labels.dedup();
        labels
    }
}

impl Default for LocaleTable {
    fn default() -> Self {
        Self::builtin()
    }
}

static ENGLISH_PROMPT: std::sync::LazyLock<PromptTemplate> = std::sync::LazyLock::new(|| {
    PromptTemplate::new(
        "Weekly horoscope for {sun} sun and {rising} rising, week {week}.",
        &[
            "Write 150-200 words in natural modern language.",
            "Include practical guidance for work, money and love.",
            "Do not use markdown, headings, or asterisks.",
            "Do not assume the user's gender. Use neutral phrasing and second person.",
            "Keep it warm, clear and specific.",
        ],
        "Horoscope:",
    )
});

fn builtin_prompts() -> Vec<(&'static str, PromptTemplate)> {
    vec![
        ("en", ENGLISH_PROMPT.clone()),
        (
            "es",
            PromptTemplate::new(
                "Horóscopo semanal para Sol en {sun} y Ascendente en {rising}, semana {week}.",
                &[
                    "Escribe entre 150 y 200 palabras en español natural y moderno.",
                    "Incluye orientación práctica sobre trabajo, dinero y amor.",
                    "No uses markdown, títulos, ni asteriscos.",
                    "No asumas el género de la persona. Usa segunda persona y construcciones neutrales cuando sea posible.",
                    "Tono cercano, claro y específico.",
                ],
                "Horóscopo:",
            ),
        ),
        (
            "ca",
            PromptTemplate::new(
                "Horòscop setmanal per a Sol en {sun} i Ascendent en {rising}, setmana {week}.",
                &[
                    "Escriu entre 150 i 200 paraules en català natural i modern.",
                    "Inclou orientació pràctica sobre feina, diners i amor.",
                    "No facis servir markdown, títols ni asteriscs.",
                    "No assumeixis el gènere de la persona. Usa segona persona i llenguatge neutral.",
                    "To proper, clar i específic.",
                ],
                "Horòscop:",
            ),
        ),
        (
            "fr",
            PromptTemplate::new(
                "Horoscope hebdomadaire pour Soleil en {sun} et Ascendant en {rising}, semaine {week}.",
                &[
                    "Écris entre 150 et 200 mots en français naturel et moderne.",
                    "Inclure des conseils pratiques sur travail, argent et amour.",
                    "N'utilise pas de markdown, de titres ni d'astérisques.",
                    "Ne présume pas le genre de la personne. Utilise un style neutre et la deuxième personne.",
                    "Ton proche, clair et concret.",
                ],
                "Horoscope :",
            ),
        ),
        (
            "de",
            PromptTemplate::new(
                "Wöchentlicher Horoskoptext für Sonne in {sun} und Aszendent {rising}, Woche {week}.",
                &[
                    "Schreibe 150 bis 200 Wörter in natürlichem, modernem Deutsch.",
                    "Enthalte praktische Hinweise zu Arbeit, Geld und Liebe.",
                    "Verwende kein Markdown, keine Überschriften und keine Sternchen.",
                    "Kein Geschlecht annehmen. Nutze neutrale Formulierungen und die zweite Person.",
                    "Ton: nahbar, klar und konkret.",
                ],
                "Horoskop:",
            ),
        ),
        (
            "pt",
            PromptTemplate::new(
                "Horóscopo semanal para Sol em {sun} e Ascendente em {rising}, semana {week}.",
                &[
                    "Escreva entre 150 e 200 palavras em português natural e moderno.",
                    "Inclua orientações práticas sobre trabalho, dinheiro e amor.",
                    "Não use markdown, títulos nem asteriscos.",
                    "Não assuma o gênero da pessoa. Use segunda pessoa e linguagem neutra.",
                    "Tom próximo, claro e específico.",
                ],
                "Horóscopo:",
            ),
        ),
        (
            "fil",
            PromptTemplate::new(
                "Lingguhang horoscope para sa Araw sa {sun} at Ascendant sa {rising}, linggo {week}.",
                &[
                    "Sumulat ng 150 hanggang 200 salita sa natural at modernong Filipino.",
                    "Isama ang praktikal na gabay sa trabaho, pera, at pag-ibig.",
                    "Huwag gumamit ng markdown, mga pamagat, o asterisk.",
                    "Huwag mag-assume ng kasarian ng user. Gumamit ng neutral na wika.",
                    "Gawing malinaw, diretso, at may init ang tono.",
                ],
                "Horoscope:",
            ),
        ),
        (
            "hi",
            PromptTemplate::new(
                "Saptahik rashifal: Surya {sun} aur Ascendant {rising}, week {week}.",
                &[
                    "150-200 shabdon mein natural aur modern Hindi mein likho.",
                    "Kaam, paisa aur pyaar par practical guidance do.",
                    "Markdown, headings ya asterisk ka use mat karo.",
                    "User ka gender assume mat karo. Neutral bhasha aur second person use karo.",
                    "Tone friendly, clear aur specific rakho.",
                ],
                "Rashifal:",
            ),
        ),
        (
            "ja",
            PromptTemplate::new(
                "週間ホロスコープ。太陽星座 {sun}、アセンダント {rising}、第{week}週。",
                &[
                    "自然で現代的な日本語で150〜200語程度で作成してください。",
                    "仕事・お金・恋愛への実用的なアドバイスを含めてください。",
                    "Markdown、見出し、アスタリスクは使わないでください。",
                    "性別は推測せず、中立的な表現で二人称中心に書いてください。",
                    "トーンは親しみやすく、明確で具体的に。",
                ],
                "ホロスコープ:",
            ),
        ),
        (
            "ru",
            PromptTemplate::new(
                "Ezhenedelnyy goroskop dlya Solntsa v {sun} i Aszendenta {rising}, nedelya {week}.",
                &[
                    "Napishite 150-200 slov na estestvennom sovremennom russkom.",
                    "Vklyuchite praktichnye sovety po rabote, dengam i lyubvi.",
                    "Ne ispolzuyte markdown, zagolovki i zvezdochki.",
                    "Ne predpolagayte pol polzovatelya. Ispolzuyte neytralnye formulirovki i vtoroe litso.",
                    "Ton blizkiy, yasnyy i konkretnyy.",
                ],
                "Goroskop:",
            ),
        ),
        (
            "zh",
            PromptTemplate::new(
                "每周运势：太阳星座{sun}，上升星座{rising}，第{week}周。",
                &[
                    "请用自然、现代的中文写150到200词。",
                    "需要包含工作、金钱和感情方面的实用建议。",
                    "不要使用markdown、标题或星号。",
                    "不要假设用户性别，使用中性表达和第二人称。",
                    "语气要亲切、清晰、具体。",
                ],
                "运势：",
            ),
        ),
        (
            "af",
            PromptTemplate::new(
                "Weeklikse horoskoop vir Son in {sun} en Ascendant in {rising}, week {week}.",
                &[
                    "Skryf 150 tot 200 woorde in natuurlike, moderne Afrikaans.",
                    "Sluit praktiese leiding oor werk, geld en liefde in.",
                    "Moenie markdown, opskrifte of sterretjies gebruik nie.",
                    "Moenie geslag aanvaar nie. Gebruik neutrale taal en tweede persoon.",
                    "Toon: vriendelik, duidelik en spesifiek.",
                ],
                "Horoskoop:",
            ),
        ),
    ]
}

const BUILTIN_SIGN_NAMES: &[(&str, [&str; 12])] = &[
    ("en", ["Aries", "Taurus", "Gemini", "Cancer", "Leo", "Virgo", "Libra", "Scorpio", "Sagittarius", "Capricorn", "Aquarius", "Pisces"]),
    ("es", ["Aries", "Tauro", "Géminis", "Cáncer", "Leo", "Virgo", "Libra", "Escorpio", "Sagitario", "Capricornio", "Acuario", "Piscis"]),
    ("ca", ["Àries", "Taure", "Bessons", "Cranc", "Lleó", "Verge", "Balança", "Escorpí", "Sagitari", "Capricorn", "Aquari", "Peixos"]),
    ("fr", ["Bélier", "Taureau", "Gémeaux", "Cancer", "Lion", "Vierge", "Balance", "Scorpion", "Sagittaire", "Capricorne", "Verseau", "Poissons"]),
    ("de", ["Widder", "Stier", "Zwillinge", "Krebs", "Löwe", "Jungfrau", "Waage", "Skorpion", "Schütze", "Steinbock", "Wassermann", "Fische"]),
    ("pt", ["Áries", "Touro", "Gêmeos", "Câncer", "Leão", "Virgem", "Libra", "Escorpião", "Sagitário", "Capricórnio", "Aquário", "Peixes"]),
    ("fil", ["Aries", "Taurus", "Gemini", "Kanser", "Leo", "Virgo", "Libra", "Scorpio", "Sagittarius", "Capricorn", "Aquarius", "Pisces"]),
    ("hi", ["Mesh", "Vrishabh", "Mithun", "Kark", "Simha", "Kanya", "Tula", "Vrishchik", "Dhanu", "Makar", "Kumbh", "Meen"]),
    ("ja", ["牡羊座", "牡牛座", "双子座", "蟹座", "獅子座", "乙女座", "天秤座", "蠍座", "射手座", "山羊座", "水瓶座", "魚座"]),
    ("ru", ["Oven", "Telets", "Bliznetsy", "Rak", "Lev", "Deva", "Vesy", "Skorpion", "Strelets", "Kozerog", "Vodoley", "Ryby"]),
    ("zh", ["白羊座", "金牛座", "双子座", "巨蟹座", "狮子座", "处女座", "天秤座", "天蝎座", "射手座", "摩羯座", "水瓶座", "双鱼座"]),
    ("af", ["Ram", "Bul", "Tweeling", "Kreef", "Leeu", "Maagd", "Weegskaal", "Skerpioen", "Boogskutter", "Steenbok", "Waterdraer", "Visse"]),
];

const ENGLISH_FALLBACK: &str = "This week works best when you cut noise early and set clear priorities from day one. In work, focus on closing one meaningful objective before Thursday and avoid scattering your energy across low-impact tasks. Depth beats speed right now. If a difficult conversation shows up, lead with facts, calm tone, and a clear intention; it can unlock more than you expect. Financially, avoid impulsive choices and review subscriptions, small recurring expenses, and habits that quietly drain your margin. One practical adjustment can reduce stress by the weekend. In love, honest communication matters more than perfect wording: be direct, listen fully, and do not assume what has not been said. If something feels off, ask one clear question and stay grounded. Your strongest move this week is disciplined consistency: promise less, follow through more. By Sunday, you should feel more organized, more confident, and much clearer about where your energy needs to go next.";

const BUILTIN_FALLBACKS: &[(&str, &str)] = &[
    ("en", ENGLISH_FALLBACK),
    ("es", "Esta semana te conviene bajar el ruido y ordenar prioridades desde el primer día. En trabajo, céntrate en cerrar un frente importante antes del jueves y deja para después lo accesorio: te irá mejor por profundidad que por velocidad. Si surge una conversación incómoda, llévala con datos, calma y un objetivo claro, porque puede desbloquear más de lo que parece. En dinero, evita decisiones impulsivas; revisa suscripciones, gastos pequeños repetidos y cualquier fuga que ya dabas por normal. Un ajuste sencillo te dará margen real de aquí al fin de semana. En amor, funciona la honestidad sin dramatizar: habla claro, escucha sin interrumpir y no des por hecho lo que no se ha dicho. Si algo te inquieta, pregunta con respeto y concreción. Tu mejor estrategia estos días es disciplina amable: menos promesas, más constancia. Llegas al domingo con sensación de orden, más confianza y una dirección bastante más limpia."),
    ("ca", "Aquesta setmana et convé reduir soroll i ordenar prioritats des del primer dia. A la feina, centra't a tancar un front important abans de dijous i deixa l'accessori per després: et funcionarà millor la profunditat que la velocitat. Si apareix una conversa incòmoda, porta-la amb dades, calma i un objectiu clar, perquè pot desbloquejar més del que sembla. En diners, evita decisions impulsives; revisa subscripcions, despeses petites repetides i qualsevol fuita que ja donaves per normal. Un ajust simple et donarà marge real de cara al cap de setmana. En amor, funciona l'honestedat sense dramatitzar: parla clar, escolta sense interrompre i no donis per fet allò que no s'ha dit. Si alguna cosa et remou, pregunta amb respecte i concreció. La millor estratègia aquests dies és disciplina amable: menys promeses, més constància. Arribes a diumenge amb sensació d'ordre, més confiança i una direcció molt més neta."),
    ("fr", "Cette semaine, ton meilleur levier est de réduire le bruit et de clarifier tes priorités dès le début. Au travail, vise une fermeture importante avant jeudi et évite de te disperser: la profondeur paiera davantage que la vitesse. Si une discussion délicate arrive, avance avec des faits, du calme et une intention claire; cela peut débloquer une situation qui stagnait. Côté argent, freine les achats impulsifs et passe en revue les abonnements, les petites dépenses répétées et les habitudes qui te grignotent sans que tu le voies. Un réglage simple peut déjà alléger la pression d'ici la fin de semaine. En amour, privilégie la sincérité sans dramatiser: parle net, écoute vraiment et ne suppose pas ce qui n'a pas été dit. Si quelque chose te dérange, pose une question précise avec respect. Ta stratégie gagnante maintenant: moins de promesses, plus de constance. D'ici dimanche, tu te sentiras plus aligné, plus stable et nettement plus en contrôle."),
    ("de", "Diese Woche gewinnst du am meisten, wenn du Lärm reduzierst und Prioritäten früh sauber setzt. Im Job lohnt sich Fokus: Schließe bis Donnerstag ein wichtiges Thema ab und lass Nebenschauplätze warten. Tiefe schlägt Tempo. Wenn ein schwieriges Gespräch ansteht, geh mit Fakten, Ruhe und klarer Absicht hinein; genau das kann einen festgefahrenen Punkt lösen. Beim Geld sind spontane Entscheidungen jetzt riskant: prüfe Abos, kleine wiederkehrende Ausgaben und Gewohnheiten, die still Ressourcen ziehen. Schon eine kleine Korrektur bringt spürbar Luft bis zum Wochenende. In der Liebe funktioniert Ehrlichkeit ohne Drama am besten: sag klar, hör wirklich zu und unterstelle nichts, was nicht ausgesprochen wurde. Wenn dich etwas beschäftigt, frag direkt und respektvoll nach. Deine beste Linie in diesen Tagen ist freundliche Disziplin: weniger ankündigen, mehr verlässlich umsetzen. Bis Sonntag fühlst du dich geordneter, sicherer und deutlich klarer in deiner Richtung."),
];

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn subject(lang: &str) -> ForecastSubject {
        ForecastSubject::new(Uuid::nil(), ZodiacSign::Leo, ZodiacSign::Virgo, 12, 2026, lang)
    }

    #[test]
    fn prompt_uses_localized_sign_names() {
        let table = LocaleTable::builtin();
        let prompt = table.build_prompt(&subject("es"));
        assert!(prompt.starts_with("Horóscopo semanal para Sol en Leo y Ascendente en Virgo, semana 12."));
        assert!(prompt.ends_with("Horóscopo:"));

        let prompt = table.build_prompt(&subject("de"));
        assert!(prompt.contains("Sonne in Löwe und Aszendent Jungfrau, Woche 12"));
    }

    #[test]
    fn unknown_language_uses_english_prompt_and_fallback() {
        let table = LocaleTable::builtin();
        let prompt = table.build_prompt(&subject("sw"));
        assert!(prompt.starts_with("Weekly horoscope for Leo sun and Virgo rising, week 12."));
        assert_eq!(table.fallback_text("sw"), ENGLISH_FALLBACK);
        assert_eq!(table.fallback_text("pt"), ENGLISH_FALLBACK);
    }

    #[test]
    fn every_fallback_is_non_empty_and_distinct() {
        let table = LocaleTable::builtin();
        let texts: Vec<&str> = ["en", "es", "ca", "fr", "de"]
            .iter()
            .map(|code| table.fallback_text(code))
            .collect();
        assert!(texts.iter().all(|t| !t.trim().is_empty()));
        let mut unique = texts.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), texts.len());
    }

    #[test]
    fn labels_cover_all_templates() {
        let labels = LocaleTable::builtin().labels();
        for expected in ["Horoscope:", "Horóscopo:", "Horoskop:", "Horòscop:", "运势：", "運勢：", "ホロスコープ:"] {
            assert!(labels.iter().any(|l| l == expected), "{expected}");
        }
    }

    #[test]
    fn overrides_extend_builtin_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locale.json");
        std::fs::write(
            &path,
            r#"{
                "fallbacks": {"it_IT": "Questa settimana procedi con calma."},
                "sign_names": {"it": {"leo": "Leone"}},
                "prompts": {"it": {
                    "header": "Oroscopo settimanale per Sole in {sun}, settimana {week}.",
                    "instructions": ["Scrivi 150-200 parole."],
                    "label": "Oroscopo:"
                }}
            }"#,
        )
        .unwrap();

        let table = LocaleTable::with_overrides_from_file(&path).unwrap();
        assert_eq!(table.fallback_text("it"), "Questa settimana procedi con calma.");
        let prompt = table.build_prompt(&subject("it"));
        assert!(prompt.starts_with("Oroscopo settimanale per Sole in Leone, settimana 12."));
        assert!(table.labels().iter().any(|l| l == "Oroscopo:"));
        // Sign names missing from the override fall back to English.
        assert_eq!(table.sign_name(ZodiacSign::Virgo, "it"), "Virgo");
    }

    #[test]
    fn missing_override_file_is_an_io_error() {
        let err = LocaleTable::with_overrides_from_file(Path::new("/nonexistent/locale.json"))
            .err()
            .unwrap();
        assert!(matches!(err, LocaleError::Io(_)));
    }
}
