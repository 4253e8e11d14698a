//! Helpers de instrumentação construídos sobre `send`.
//!
//! - [`Timer`]: cronômetro com prefixo opcional; reporta ao parar ou ao sair
//!   de escopo.
//! - [`measure`]: envolve uma função e reporta a duração de cada chamada bem
//!   sucedida.
//!
//! Os nomes das métricas são explícitos (label) ou, no caso de `measure`,
//! derivados do nome estático do tipo da função.

use std::sync::{Arc, OnceLock};
use std::time::Instant;

/// Destino das métricas. Implementado por [`crate::Client`] e pelo client
/// global ([`crate::global::Global`]).
pub trait MetricSink {
    fn send(&self, metric: &str, value: f64, timestamp: Option<f64>);
}

impl<T: MetricSink + ?Sized> MetricSink for &T {
    fn send(&self, metric: &str, value: f64, timestamp: Option<f64>) {
        (**self).send(metric, value, timestamp);
    }
}

impl<T: MetricSink + ?Sized> MetricSink for Arc<T> {
    fn send(&self, metric: &str, value: f64, timestamp: Option<f64>) {
        (**self).send(metric, value, timestamp);
    }
}

/// Junta as partes não vazias com `.`.
fn join_metric<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(".")
}

// ──────────────────────────────────────────────
// Timer
// ──────────────────────────────────────────────

/// Cronômetro que envia o tempo decorrido (segundos) ao parar.
///
/// Um Timer em andamento que sai de escopo é parado e reporta, inclusive
/// durante unwind de panic.
pub struct Timer<'a, S: MetricSink + ?Sized> {
    sink: &'a S,
    prefix: Option<String>,
    metric: String,
    started: Option<Instant>,
}

impl<'a, S: MetricSink + ?Sized> Timer<'a, S> {
    pub fn new(sink: &'a S, prefix: Option<&str>) -> Self {
        Self {
            sink,
            prefix: prefix.map(str::to_string),
            metric: String::new(),
            started: None,
        }
    }

    /// Cria e já inicia com label vazio: a métrica é só o prefixo.
    /// Reporta quando o valor sai de escopo.
    pub fn scoped(sink: &'a S, prefix: Option<&str>) -> Self {
        let mut timer = Self::new(sink, prefix);
        timer.start("");
        timer
    }

    /// Inicia a contagem. A métrica passa a ser `prefixo.label`.
    pub fn start(&mut self, label: &str) {
        self.metric = join_metric(self.prefix.as_deref().into_iter().chain([label]));
        self.started = Some(Instant::now());
    }

    /// Para e reporta. Sem efeito se não estiver rodando.
    pub fn stop(&mut self) {
        if let Some(started) = self.started.take() {
            self.sink
                .send(&self.metric, started.elapsed().as_secs_f64(), None);
        }
    }

    /// Reporta o intervalo atual e começa outro.
    pub fn restart(&mut self, label: &str) {
        self.stop();
        self.start(label);
    }

    /// Para sem reportar.
    pub fn cancel(&mut self) {
        self.started = None;
    }

    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }

    pub fn metric(&self) -> &str {
        &self.metric
    }
}

impl<S: MetricSink + ?Sized> Drop for Timer<'_, S> {
    fn drop(&mut self) {
        self.stop();
    }
}

// ──────────────────────────────────────────────
// measure
// ──────────────────────────────────────────────

/// Função instrumentada por [`measure`].
pub struct Measured<'a, S: MetricSink + ?Sized, F> {
    sink: &'a S,
    prefix: Option<String>,
    func: F,
    metric: OnceLock<String>,
}

/// Envolve `func`: cada chamada bem sucedida envia a duração (segundos).
///
/// O nome da métrica é `prefixo.caminho.da.funcao`, calculado na primeira
/// chamada a partir de [`std::any::type_name`] e memorizado. Closures herdam
/// o nome da função onde foram definidas.
///
/// Funções com argumentos usam [`Measured::call_with`] /
/// [`Measured::try_call_with`]. Se a função falha (panic, ou `Err` nas
/// variantes `try_*`), nada é reportado.
pub fn measure<'a, S, F>(sink: &'a S, prefix: Option<&str>, func: F) -> Measured<'a, S, F>
where
    S: MetricSink + ?Sized,
{
    Measured {
        sink,
        prefix: prefix.map(str::to_string),
        func,
        metric: OnceLock::new(),
    }
}

impl<S: MetricSink + ?Sized, F> Measured<'_, S, F> {
    /// Nome da métrica (memorizado).
    pub fn metric(&self) -> &str {
        self.metric.get_or_init(|| {
            let path = function_path::<F>();
            join_metric(self.prefix.as_deref().into_iter().chain([path.as_str()]))
        })
    }

    /// Chama a função e reporta a duração.
    pub fn call<R>(&self) -> R
    where
        F: Fn() -> R,
    {
        let metric = self.metric();
        let before = Instant::now();
        let result = (self.func)();
        self.sink.send(metric, before.elapsed().as_secs_f64(), None);
        result
    }

    /// Chama a função e reporta a duração apenas se o resultado for `Ok`.
    pub fn try_call<T, E>(&self) -> Result<T, E>
    where
        F: Fn() -> Result<T, E>,
    {
        let metric = self.metric();
        let before = Instant::now();
        let result = (self.func)()?;
        self.sink.send(metric, before.elapsed().as_secs_f64(), None);
        Ok(result)
    }

    /// Como [`Measured::call`], repassando `args` à função a cada chamada.
    /// Vários argumentos vão como tupla.
    pub fn call_with<A, R>(&self, args: A) -> R
    where
        F: Fn(A) -> R,
    {
        let metric = self.metric();
        let before = Instant::now();
        let result = (self.func)(args);
        self.sink.send(metric, before.elapsed().as_secs_f64(), None);
        result
    }

    /// Como [`Measured::try_call`], repassando `args` à função.
    pub fn try_call_with<A, T, E>(&self, args: A) -> Result<T, E>
    where
        F: Fn(A) -> Result<T, E>,
    {
        let metric = self.metric();
        let before = Instant::now();
        let result = (self.func)(args)?;
        self.sink.send(metric, before.elapsed().as_secs_f64(), None);
        Ok(result)
    }
}

/// `a::b::c::{{closure}}` → `a.b.c`
fn function_path<F>() -> String {
    std::any::type_name::<F>()
        .split("::")
        .filter(|segment| *segment != "{{closure}}")
        .collect::<Vec<_>>()
        .join(".")
}
