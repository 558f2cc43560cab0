//! The SIP user agent
//!
//! A single task owns the signalling socket and all dialog state: the
//! registration refresh cycle, the inbound INVITE dialog and BYE handling
//! in both directions. At most one call is active at a time; a second
//! INVITE while busy is answered 486.
//!
//! The admission decision is made synchronously before any media work: the
//! [`TrunkHandler::on_incoming`] callback runs between receiving the INVITE
//! and sending the final response, so a blacklisted caller is rejected
//! before a single RTP packet flows.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use voxgate_audio_core::{AudioFrame, FrameQueue};

use crate::auth::DigestChallenge;
use crate::codec::MediaCodec;
use crate::error::{Result, TrunkError};
use crate::message::{
    self, caller_id_from_header, header_tag, new_branch, new_tag, reason_phrase, SipMessage,
    SipRequest, SipResponse,
};
use crate::registration::{
    RegisterBackoff, RegisterFailure, RegistrationStatus, REGISTER_INTERVAL, REGISTER_TIMEOUT,
};
use crate::rtp::{bind_media_port, spawn_media_session, MediaSession};
use crate::sdp;
use crate::TX_QUEUE_FRAMES;

const ACK_TIMEOUT: Duration = Duration::from_secs(10);
const HOUSEKEEPING_TICK: Duration = Duration::from_millis(500);
const RX_CHANNEL_FRAMES: usize = 64;
const MEDIA_ABANDON_AFTER: Duration = Duration::from_secs(2);

/// Trunk configuration
#[derive(Debug, Clone)]
pub struct TrunkConfig {
    /// Registrar / proxy host
    pub server_host: String,
    /// Registrar port, usually 5060
    pub server_port: u16,
    /// SIP account user
    pub username: String,
    /// SIP account password
    pub password: String,
    /// Public address written into Contact and SDP
    pub public_ip: IpAddr,
    /// Local signalling port
    pub local_sip_port: u16,
    /// Lower bound of the RTP port window
    pub media_port_min: u16,
    /// Upper bound of the RTP port window
    pub media_port_max: u16,
    /// User-Agent header value
    pub user_agent: String,
}

impl TrunkConfig {
    fn server_uri(&self) -> String {
        format!("sip:{}", self.server_host)
    }

    fn address_of_record(&self) -> String {
        format!("sip:{}@{}", self.username, self.server_host)
    }

    fn contact(&self) -> String {
        format!(
            "<sip:{}@{}:{}>",
            self.username, self.public_ip, self.local_sip_port
        )
    }
}

/// An INVITE awaiting an admission decision
#[derive(Debug, Clone)]
pub struct IncomingCall {
    /// Parsed caller number
    pub caller_id: String,
    /// SIP Call-ID of the dialog
    pub call_id: String,
}

/// Admission decision for an incoming call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallDecision {
    /// Answer 200 and bridge media
    Accept,
    /// Respond with the given status code (403 blacklist, 486 busy, ...)
    Reject(u16),
}

/// Media legs of an accepted call, handed to the supervisor
pub struct EstablishedCall {
    /// SIP Call-ID of the dialog
    pub call_id: String,
    /// Parsed caller number
    pub caller_id: String,
    /// Caller audio, 48 kHz frames
    pub rx: mpsc::Receiver<AudioFrame>,
    /// Audio towards the caller, 48 kHz frames, 10 s capacity
    pub tx: Arc<FrameQueue>,
}

/// Observer for trunk events
#[async_trait]
pub trait TrunkHandler: Send + Sync {
    /// Admission decision; runs before the final INVITE response
    async fn on_incoming(&self, call: &IncomingCall) -> CallDecision;
    /// Media is up; ownership of the call's audio legs transfers here
    async fn on_established(&self, call: EstablishedCall);
    /// The dialog ended (peer BYE, our hangup, or setup failure)
    async fn on_call_ended(&self, call_id: &str);
    /// Registration status changed
    async fn on_registration(&self, status: RegistrationStatus);
}

enum TrunkCommand {
    Hangup { call_id: String },
    Shutdown,
}

/// Handle to the running trunk task
pub struct SipTrunk {
    commands: mpsc::Sender<TrunkCommand>,
    task: JoinHandle<()>,
}

impl SipTrunk {
    /// Bind the signalling socket and start the trunk task
    pub async fn start(config: TrunkConfig, handler: Arc<dyn TrunkHandler>) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", config.local_sip_port)).await?;
        let server_addr = resolve_server(&config).await?;
        info!(
            server = %server_addr,
            local_port = config.local_sip_port,
            "SIP trunk starting"
        );

        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let mut state = TrunkState {
            config,
            handler,
            socket,
            server_addr,
            reg: RegState::new(),
            dialog: None,
            commands: cmd_rx,
        };
        let task = tokio::spawn(async move { state.run().await });

        Ok(Self {
            commands: cmd_tx,
            task,
        })
    }

    /// Tear down the dialog with the given Call-ID (sends BYE)
    pub async fn hangup(&self, call_id: &str) {
        let _ = self
            .commands
            .send(TrunkCommand::Hangup {
                call_id: call_id.to_string(),
            })
            .await;
    }

    /// Stop the trunk task, hanging up an active call first
    pub async fn shutdown(&self) {
        let _ = self.commands.send(TrunkCommand::Shutdown).await;
        // Give the loop a moment to send BYE/cleanup before we stop it.
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.task.abort();
    }
}

async fn resolve_server(config: &TrunkConfig) -> Result<SocketAddr> {
    let target = format!("{}:{}", config.server_host, config.server_port);
    tokio::net::lookup_host(&target)
        .await?
        .next()
        .ok_or_else(|| TrunkError::Network {
            reason: format!("cannot resolve {target}"),
        })
}

struct RegState {
    status: RegistrationStatus,
    cseq: u32,
    call_id: String,
    from_tag: String,
    pending: Option<PendingRegister>,
    backoff: RegisterBackoff,
    next_attempt: Instant,
}

struct PendingRegister {
    cseq: u32,
    deadline: Instant,
    authed: bool,
}

impl RegState {
    fn new() -> Self {
        Self {
            status: RegistrationStatus::Unregistered,
            cseq: 0,
            call_id: format!("{:016x}", rand::random::<u64>()),
            from_tag: new_tag(),
            pending: None,
            backoff: RegisterBackoff::new(),
            next_attempt: Instant::now(),
        }
    }
}

enum DialogState {
    WaitingAck { deadline: Instant },
    Confirmed,
}

struct Dialog {
    call_id: String,
    caller_id: String,
    local_tag: String,
    remote_tag: String,
    remote_uri: String,
    signalling_addr: SocketAddr,
    invite_cseq: u32,
    local_cseq: u32,
    cached_ok: Vec<u8>,
    state: DialogState,
    media: Option<MediaSession>,
    pending_media: Option<PendingMedia>,
}

struct PendingMedia {
    socket: UdpSocket,
    remote: SocketAddr,
    codec: MediaCodec,
    payload_type: u8,
}

struct TrunkState {
    config: TrunkConfig,
    handler: Arc<dyn TrunkHandler>,
    socket: UdpSocket,
    server_addr: SocketAddr,
    reg: RegState,
    dialog: Option<Dialog>,
    commands: mpsc::Receiver<TrunkCommand>,
}

impl TrunkState {
    async fn run(&mut self) {
        let mut buf = vec![0u8; 65535];
        let mut tick = tokio::time::interval(HOUSEKEEPING_TICK);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                recv = self.socket.recv_from(&mut buf) => {
                    match recv {
                        Ok((n, from)) => self.handle_datagram(&buf[..n], from).await,
                        Err(e) => warn!(error = %e, "SIP socket recv error"),
                    }
                }
                cmd = self.commands.recv() => {
                    match cmd {
                        Some(TrunkCommand::Hangup { call_id }) => self.hangup_dialog(&call_id).await,
                        Some(TrunkCommand::Shutdown) | None => {
                            self.shutdown().await;
                            break;
                        }
                    }
                }
                _ = tick.tick() => self.handle_timers().await,
            }
        }
    }

    // ---- timers --------------------------------------------------------

    async fn handle_timers(&mut self) {
        let now = Instant::now();

        // Registration refresh / retry / response timeout.
        let register_timed_out = self
            .reg
            .pending
            .as_ref()
            .is_some_and(|p| now >= p.deadline);
        if register_timed_out {
            warn!("REGISTER timed out");
            self.reg.pending = None;
            let delay = self.reg.backoff.next_delay();
            self.reg.next_attempt = now + delay;
            self.set_registration(RegistrationStatus::Failed(RegisterFailure::Timeout))
                .await;
        } else if self.reg.pending.is_none()
            && self.registration_retryable()
            && now >= self.reg.next_attempt
        {
            self.send_register(None).await;
        }

        // A caller that never ACKed our 200.
        let expired = matches!(
            self.dialog.as_ref().map(|d| &d.state),
            Some(DialogState::WaitingAck { deadline }) if now >= *deadline
        );
        if expired {
            warn!("no ACK for 200 OK, dropping dialog");
            self.end_dialog().await;
        }
    }

    fn registration_retryable(&self) -> bool {
        !matches!(
            self.reg.status,
            RegistrationStatus::Failed(RegisterFailure::Auth)
        )
    }

    async fn set_registration(&mut self, status: RegistrationStatus) {
        if self.reg.status != status {
            self.reg.status = status;
            self.handler.on_registration(status).await;
        }
    }

    // ---- registration --------------------------------------------------

    async fn send_register(&mut self, auth: Option<String>) {
        self.reg.cseq += 1;
        let config = &self.config;
        let mut req = SipRequest::new("REGISTER", config.server_uri());
        req.headers.push(
            "Via",
            format!(
                "SIP/2.0/UDP {}:{};branch={};rport",
                config.public_ip,
                config.local_sip_port,
                new_branch()
            ),
        );
        req.headers.push("Max-Forwards", "70");
        req.headers.push(
            "From",
            format!("<{}>;tag={}", config.address_of_record(), self.reg.from_tag),
        );
        req.headers
            .push("To", format!("<{}>", config.address_of_record()));
        req.headers.push("Call-ID", self.reg.call_id.clone());
        req.headers
            .push("CSeq", format!("{} REGISTER", self.reg.cseq));
        req.headers.push("Contact", config.contact());
        req.headers
            .push("Expires", REGISTER_INTERVAL.as_secs().to_string());
        req.headers.push("User-Agent", config.user_agent.clone());
        let authed = auth.is_some();
        if let Some(authorization) = auth {
            req.headers.push("Authorization", authorization);
        }

        debug!(cseq = self.reg.cseq, authed, "sending REGISTER");
        self.set_registration(RegistrationStatus::Registering).await;
        if let Err(e) = self.socket.send_to(&req.to_bytes(), self.server_addr).await {
            warn!(error = %e, "REGISTER send failed");
            let delay = self.reg.backoff.next_delay();
            self.reg.next_attempt = Instant::now() + delay;
            self.set_registration(RegistrationStatus::Failed(RegisterFailure::Network))
                .await;
            return;
        }
        self.reg.pending = Some(PendingRegister {
            cseq: self.reg.cseq,
            deadline: Instant::now() + REGISTER_TIMEOUT,
            authed,
        });
    }

    async fn handle_register_response(&mut self, resp: SipResponse) {
        let Some(pending) = self.reg.pending.take() else {
            return;
        };
        if resp.cseq().map(|(seq, _)| seq) != Some(pending.cseq) {
            self.reg.pending = Some(pending);
            return;
        }

        match resp.status {
            200 => {
                info!("registration active");
                self.reg.backoff.reset();
                self.reg.next_attempt = Instant::now() + REGISTER_INTERVAL;
                self.set_registration(RegistrationStatus::Active).await;
            }
            401 | 407 => {
                if pending.authed {
                    warn!("registrar rejected credentials");
                    self.set_registration(RegistrationStatus::Failed(RegisterFailure::Auth))
                        .await;
                    return;
                }
                let challenge_header = resp
                    .headers
                    .get("WWW-Authenticate")
                    .or_else(|| resp.headers.get("Proxy-Authenticate"));
                let Some(raw) = challenge_header else {
                    warn!("401 without challenge");
                    self.set_registration(RegistrationStatus::Failed(RegisterFailure::Auth))
                        .await;
                    return;
                };
                match DigestChallenge::parse(raw) {
                    Ok(challenge) => {
                        let authorization = challenge.authorization(
                            &self.config.username,
                            &self.config.password,
                            "REGISTER",
                            &self.config.server_uri(),
                        );
                        self.send_register(Some(authorization)).await;
                    }
                    Err(e) => {
                        warn!(error = %e, "unusable auth challenge");
                        self.set_registration(RegistrationStatus::Failed(RegisterFailure::Auth))
                            .await;
                    }
                }
            }
            403 => {
                warn!("registration forbidden");
                self.set_registration(RegistrationStatus::Failed(RegisterFailure::Auth))
                    .await;
            }
            status => {
                warn!(status, "unexpected REGISTER response");
                let delay = self.reg.backoff.next_delay();
                self.reg.next_attempt = Instant::now() + delay;
                self.set_registration(RegistrationStatus::Failed(RegisterFailure::Network))
                    .await;
            }
        }
    }

    // ---- inbound requests ----------------------------------------------

    async fn handle_datagram(&mut self, buf: &[u8], from: SocketAddr) {
        let msg = match message::parse(buf) {
            Ok(m) => m,
            Err(e) => {
                debug!(error = %e, from = %from, "unparseable SIP datagram");
                return;
            }
        };
        match msg {
            SipMessage::Response(resp) => {
                if let Some((_, method)) = resp.cseq() {
                    match method.as_str() {
                        "REGISTER" => self.handle_register_response(resp).await,
                        "BYE" => debug!(status = resp.status, "BYE answered"),
                        other => debug!(method = other, "ignoring response"),
                    }
                }
            }
            SipMessage::Request(req) => self.handle_request(req, from).await,
        }
    }

    async fn handle_request(&mut self, req: SipRequest, from: SocketAddr) {
        match req.method.as_str() {
            "INVITE" => self.handle_invite(req, from).await,
            "ACK" => self.handle_ack(req).await,
            "BYE" => self.handle_bye(req, from).await,
            "CANCEL" => {
                // We answer INVITEs immediately, so a CANCEL almost always
                // races a 200 already on the wire.
                self.respond(&req, 200, from).await;
            }
            "OPTIONS" => {
                self.respond(&req, 200, from).await;
            }
            method => {
                debug!(method, "unsupported request");
                self.respond(&req, 481, from).await;
            }
        }
    }

    async fn handle_invite(&mut self, req: SipRequest, from: SocketAddr) {
        let call_id = req.headers.get("Call-ID").unwrap_or("").to_string();

        // Retransmitted INVITE for the dialog we already answered.
        if let Some(dialog) = &self.dialog {
            if dialog.call_id == call_id {
                if req.cseq().map(|(seq, _)| seq) == Some(dialog.invite_cseq) {
                    debug!("INVITE retransmission, replaying 200");
                    let cached = dialog.cached_ok.clone();
                    let _ = self.socket.send_to(&cached, from).await;
                } else {
                    // Re-INVITE (hold, codec change): not supported.
                    debug!("re-INVITE rejected");
                    self.respond(&req, 488, from).await;
                }
                return;
            }
            debug!(call_id = %call_id, "INVITE while busy");
            self.respond(&req, 486, from).await;
            return;
        }

        let from_header = req.headers.get("From").unwrap_or("").to_string();
        let caller_id = caller_id_from_header(&from_header);
        let incoming = IncomingCall {
            caller_id: caller_id.clone(),
            call_id: call_id.clone(),
        };
        info!(caller = %caller_id, call_id = %call_id, "incoming INVITE");

        self.respond(&req, 100, from).await;

        // Admission decision before any media resources are committed.
        let decision = self.handler.on_incoming(&incoming).await;
        if let CallDecision::Reject(code) = decision {
            info!(caller = %caller_id, code, "call rejected");
            self.respond(&req, code, from).await;
            return;
        }

        let body = String::from_utf8_lossy(&req.body);
        let offer = match sdp::parse_offer(&body) {
            Ok(offer) => offer,
            Err(e) => {
                warn!(error = %e, "bad SDP offer");
                self.respond(&req, 488, from).await;
                return;
            }
        };
        let Some(negotiated) = sdp::select_codec(&offer) else {
            warn!("no supported codec in offer");
            self.respond(&req, 488, from).await;
            return;
        };
        let codec = match MediaCodec::new(&negotiated) {
            Ok(codec) => codec,
            Err(e) => {
                warn!(error = %e, "codec init failed");
                self.respond(&req, 488, from).await;
                return;
            }
        };
        let media_socket = match bind_media_port(
            IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED),
            self.config.media_port_min,
            self.config.media_port_max,
        )
        .await
        {
            Ok(socket) => socket,
            Err(e) => {
                warn!(error = %e, "media port allocation failed");
                self.respond(&req, 486, from).await;
                return;
            }
        };
        let rtp_port = media_socket
            .local_addr()
            .map(|a| a.port())
            .unwrap_or(self.config.media_port_min);

        info!(
            caller = %caller_id,
            codec = ?negotiated.kind,
            rtp_port,
            "accepting call"
        );
        self.respond(&req, 180, from).await;

        let answer = sdp::build_answer(
            self.config.public_ip,
            rtp_port,
            negotiated,
            rand::random::<u32>() as u64,
        );
        let local_tag = new_tag();
        let ok = self.build_final_ok(&req, &local_tag, &answer);
        let cached_ok = ok.to_bytes();
        let _ = self.socket.send_to(&cached_ok, from).await;

        self.dialog = Some(Dialog {
            call_id,
            caller_id,
            local_tag,
            remote_tag: header_tag(&from_header).unwrap_or("").to_string(),
            remote_uri: message::header_uri(&from_header).to_string(),
            signalling_addr: from,
            invite_cseq: req.cseq().map(|(seq, _)| seq).unwrap_or(1),
            local_cseq: 1,
            cached_ok,
            state: DialogState::WaitingAck {
                deadline: Instant::now() + ACK_TIMEOUT,
            },
            media: None,
            pending_media: Some(PendingMedia {
                socket: media_socket,
                remote: SocketAddr::new(offer.connection, offer.media_port),
                codec,
                payload_type: negotiated.payload_type,
            }),
        });
    }

    async fn handle_ack(&mut self, req: SipRequest) {
        let call_id = req.headers.get("Call-ID").unwrap_or("");
        let established = {
            let Some(dialog) = &mut self.dialog else {
                return;
            };
            if dialog.call_id != call_id {
                return;
            }
            if !matches!(dialog.state, DialogState::WaitingAck { .. }) {
                return;
            }
            dialog.state = DialogState::Confirmed;

            let Some(pending) = dialog.pending_media.take() else {
                return;
            };
            let tx_queue = FrameQueue::new("tx-48k", TX_QUEUE_FRAMES);
            let (rx_tx, rx_rx) = mpsc::channel(RX_CHANNEL_FRAMES);
            let media = spawn_media_session(
                pending.socket,
                pending.remote,
                pending.codec,
                pending.payload_type,
                tx_queue.clone(),
                rx_tx,
            );
            dialog.media = Some(media);

            info!(call_id = %dialog.call_id, "call established, media up");
            EstablishedCall {
                call_id: dialog.call_id.clone(),
                caller_id: dialog.caller_id.clone(),
                rx: rx_rx,
                tx: tx_queue,
            }
        };
        let handler = self.handler.clone();
        handler.on_established(established).await;
    }

    async fn handle_bye(&mut self, req: SipRequest, from: SocketAddr) {
        let call_id = req.headers.get("Call-ID").unwrap_or("").to_string();
        let matches_dialog = self
            .dialog
            .as_ref()
            .is_some_and(|d| d.call_id == call_id);
        if matches_dialog {
            info!(call_id = %call_id, "peer hung up");
            self.respond(&req, 200, from).await;
            self.end_dialog().await;
        } else {
            self.respond(&req, 481, from).await;
        }
    }

    // ---- outbound teardown ---------------------------------------------

    async fn hangup_dialog(&mut self, call_id: &str) {
        let Some(dialog) = &mut self.dialog else {
            return;
        };
        if dialog.call_id != call_id {
            return;
        }
        if matches!(dialog.state, DialogState::Confirmed) {
            dialog.local_cseq += 1;
            let config = &self.config;
            let mut bye = SipRequest::new("BYE", dialog.remote_uri.clone());
            bye.headers.push(
                "Via",
                format!(
                    "SIP/2.0/UDP {}:{};branch={};rport",
                    config.public_ip,
                    config.local_sip_port,
                    new_branch()
                ),
            );
            bye.headers.push("Max-Forwards", "70");
            bye.headers.push(
                "From",
                format!(
                    "<{}>;tag={}",
                    config.address_of_record(),
                    dialog.local_tag
                ),
            );
            bye.headers.push(
                "To",
                format!("<{}>;tag={}", dialog.remote_uri, dialog.remote_tag),
            );
            bye.headers.push("Call-ID", dialog.call_id.clone());
            bye.headers.push("CSeq", format!("{} BYE", dialog.local_cseq));
            bye.headers.push("User-Agent", config.user_agent.clone());

            info!(call_id = %dialog.call_id, "sending BYE");
            let target = dialog.signalling_addr;
            let wire = bye.to_bytes();
            let _ = self.socket.send_to(&wire, target).await;
        }
        self.end_dialog().await;
    }

    async fn end_dialog(&mut self) {
        if let Some(dialog) = self.dialog.take() {
            if let Some(media) = dialog.media {
                media.stop();
                tokio::spawn(async move {
                    tokio::time::sleep(MEDIA_ABANDON_AFTER).await;
                    media.abort();
                });
            }
            self.handler.on_call_ended(&dialog.call_id).await;
        }
    }

    async fn shutdown(&mut self) {
        if let Some(dialog) = &self.dialog {
            let call_id = dialog.call_id.clone();
            self.hangup_dialog(&call_id).await;
        }
        info!("SIP trunk shutting down");
    }

    // ---- response building ---------------------------------------------

    fn build_final_ok(&self, req: &SipRequest, local_tag: &str, sdp_body: &str) -> SipResponse {
        let mut resp = self.response_skeleton(req, 200);
        let to = req.headers.get("To").unwrap_or("").to_string();
        resp.headers.set("To", format!("{to};tag={local_tag}"));
        resp.headers.push("Contact", self.config.contact());
        resp.headers.push("Content-Type", "application/sdp");
        resp.body = sdp_body.as_bytes().to_vec();
        resp
    }

    fn response_skeleton(&self, req: &SipRequest, status: u16) -> SipResponse {
        let mut resp = SipResponse {
            status,
            reason: reason_phrase(status).to_string(),
            headers: message::Headers::new(),
            body: Vec::new(),
        };
        for via in req.headers.get_all("Via") {
            resp.headers.push("Via", via.to_string());
        }
        if let Some(from) = req.headers.get("From") {
            resp.headers.push("From", from.to_string());
        }
        if let Some(to) = req.headers.get("To") {
            resp.headers.push("To", to.to_string());
        }
        if let Some(call_id) = req.headers.get("Call-ID") {
            resp.headers.push("Call-ID", call_id.to_string());
        }
        if let Some(cseq) = req.headers.get("CSeq") {
            resp.headers.push("CSeq", cseq.to_string());
        }
        resp.headers
            .push("User-Agent", self.config.user_agent.clone());
        resp
    }

    async fn respond(&self, req: &SipRequest, status: u16, to: SocketAddr) {
        let mut resp = self.response_skeleton(req, status);
        // Final responses need a To tag to complete the dialog leg.
        if status >= 200 {
            let to_header = req.headers.get("To").unwrap_or("").to_string();
            if header_tag(&to_header).is_none() {
                resp.headers
                    .set("To", format!("{to_header};tag={}", new_tag()));
            }
        }
        if let Err(e) = self.socket.send_to(&resp.to_bytes(), to).await {
            warn!(error = %e, status, "response send failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_formats_identity() {
        let config = TrunkConfig {
            server_host: "sip.example.de".into(),
            server_port: 5060,
            username: "4910001".into(),
            password: "secret".into(),
            public_ip: "198.51.100.7".parse().unwrap(),
            local_sip_port: 5060,
            media_port_min: 4000,
            media_port_max: 4100,
            user_agent: "voxgate/0.1".into(),
        };
        assert_eq!(config.server_uri(), "sip:sip.example.de");
        assert_eq!(config.address_of_record(), "sip:4910001@sip.example.de");
        assert_eq!(config.contact(), "<sip:4910001@198.51.100.7:5060>");
    }
}
