//! Fallback dialogue used when no script is supplied.
//!
//! Every line stays inside the accepted word band so a template plan passes
//! the same validation as a scripted one.

use reelgen_models::{ContentType, Emotion, Role};

/// Template dialogue line and the emotion it is delivered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TemplateLine {
    pub text: &'static str,
    pub emotion: Emotion,
}

const fn line(text: &'static str, emotion: Emotion) -> TemplateLine {
    TemplateLine { text, emotion }
}

pub fn template_for(content_type: ContentType, role: Role) -> TemplateLine {
    match (content_type, role) {
        (ContentType::Chollo, Role::Intro) => line(
            "Misters, tengo un chollo que casi nadie está mirando esta jornada y que puede cambiar por completo vuestra plantilla si os movéis rápido hoy mismo.",
            Emotion::Curiosidad,
        ),
        (ContentType::Chollo, Role::Analysis) => line(
            "Los números no mienten: titular indiscutible, minutos garantizados y un calendario muy amable durante las próximas tres jornadas, justo lo que buscamos en un fichaje barato.",
            Emotion::Confianza,
        ),
        (ContentType::Chollo, Role::Middle) => line(
            "Su precio sigue siendo ridículo para lo que aporta, sube cada semana y los puntos llegan con regularidad, así que el valor está clarísimo ahora mismo.",
            Emotion::Validacion,
        ),
        (ContentType::Chollo, Role::Outro) => line(
            "No esperéis a que todo el mundo lo descubra, ficharlo ahora os cuesta poco y mañana puede ser tarde. Contadme en comentarios si ya lo tenéis.",
            Emotion::Urgencia,
        ),
        (ContentType::Analysis, Role::Intro) => line(
            "Hoy vamos a mirar los datos con calma, porque hay un jugador cuyo rendimiento real no coincide para nada con lo que marca su precio actual.",
            Emotion::Curiosidad,
        ),
        (ContentType::Analysis, Role::Analysis) => line(
            "Fijaos en sus remates por partido, en los balones recuperados y en la participación en jugadas de gol: todas las métricas suben desde hace cinco semanas.",
            Emotion::Confianza,
        ),
        (ContentType::Analysis, Role::Middle) => line(
            "Comparado con otros jugadores de su posición y precio, aporta más puntos por millón invertido y además apenas acumula tarjetas ni lesiones esta temporada.",
            Emotion::Validacion,
        ),
        (ContentType::Analysis, Role::Outro) => line(
            "Mi conclusión es sencilla: es una pieza fiable para vuestro once. Guardad este análisis y decidme qué jugador queréis que revise la próxima semana.",
            Emotion::Entusiasmo,
        ),
        (ContentType::Breaking, Role::Intro) => line(
            "Atención Misters, última hora importante: acaba de confirmarse una baja que cambia los planes de muchísimos equipos antes del cierre de esta jornada.",
            Emotion::Alerta,
        ),
        (ContentType::Breaking, Role::Analysis) => line(
            "Según el parte médico estará fuera varias semanas, así que su valor va a caer rápido y conviene revisar vuestra alineación cuanto antes posible.",
            Emotion::Preocupacion,
        ),
        (ContentType::Breaking, Role::Middle) => line(
            "El sustituto natural entra directamente en el once, cuesta muy poco y tiene un calendario favorable, lo que lo convierte en una alternativa muy interesante.",
            Emotion::Sorpresa,
        ),
        (ContentType::Breaking, Role::Outro) => line(
            "Moved ficha ya, antes de que el mercado reaccione y los precios se disparen. Activad las notificaciones para no perderos la próxima noticia urgente.",
            Emotion::Urgencia,
        ),
    }
}
