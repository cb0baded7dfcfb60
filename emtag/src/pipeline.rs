//! Pipeline orchestrator
//!
//! Advances contexts through the protocol pipeline once per iteration of the
//! cooperative main loop. The loop is the lowest-priority execution path of
//! the firmware: interrupt handlers may preempt it anywhere except inside the
//! pool's critical sections, and it is never reentered.
//!
//! Per iteration, fixed order: outbound drain, then inbound intake, then
//! backpressure relief. Draining first means contexts freed by completed
//! transmissions are claimable again within the same iteration.

use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::core::{ContextState, EpId};
use crate::header::CommandHeader;
use crate::pool::{Context, ContextPool};

/// Backpressure seam: re-enables interrupt sources throttled on pool
/// exhaustion. Implemented by the demultiplexers.
pub trait Throttle {
    fn resume(&self);
}

/// Dispatcher verdict on one inbound command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Disposition {
    /// Queue the context for transmission on the given outbound endpoint;
    /// the dispatcher has rewritten the buffer with the reply
    Reply(EpId),
    /// No reply warranted, return the context to the pool
    Done,
}

/// USB transmission seam
///
/// `submit` hands a context to the transfer layer. `Err` returns the token
/// on a busy endpoint; the orchestrator requeues it for the next iteration.
/// An accepted context is transitioned from its completion interrupt handler
/// through the pool (`release`, or `set_state(.., RecvDone)` for loop-back
/// flows), never by the main loop.
pub trait UsbOutbound<'a> {
    fn submit(&mut self, ep: EpId, ctx: Context<'a>) -> Result<(), Context<'a>>;
}

/// Protocol command dispatch seam
///
/// Receives the parsed header plus the owned context, still tagged
/// `MainProcessing`. May access RFID-chip registers synchronously; command
/// failures belong to the protocol layer and surface as status bytes in the
/// reply, not here.
pub trait Dispatch {
    fn dispatch(&mut self, header: CommandHeader, ctx: &mut Context<'_>) -> Disposition;
}

/// The cooperative main-processing loop body
pub struct Pipeline<'a, M: RawMutex, const N: usize, U, D> {
    pool: &'a ContextPool<M, N>,
    usb: U,
    dispatch: D,
    throttles: &'a [&'a dyn Throttle],
    outbound_endpoints: u8,
    header_errors: u32,
}

impl<'a, M, const N: usize, U, D> Pipeline<'a, M, N, U, D>
where
    M: RawMutex,
    U: UsbOutbound<'a>,
    D: Dispatch,
{
    /// `outbound_endpoints` is the number of IN endpoints the configuration
    /// defines; endpoint ids `0..outbound_endpoints` are drained each
    /// iteration.
    pub fn new(
        pool: &'a ContextPool<M, N>,
        usb: U,
        dispatch: D,
        throttles: &'a [&'a dyn Throttle],
        outbound_endpoints: u8,
    ) -> Self {
        debug_assert!(usize::from(outbound_endpoints) <= usize::from(EpId::MAX) + 1);
        Self {
            pool,
            usb,
            dispatch,
            throttles,
            outbound_endpoints,
            header_errors: 0,
        }
    }

    /// Runs one main-loop iteration.
    pub fn poll(&mut self) {
        self.drain_outbound();
        self.intake_inbound();
        self.relieve_backpressure();
    }

    /// Runs the main loop forever. Never reentered, never yields.
    pub fn run(&mut self) -> ! {
        loop {
            self.poll();
        }
    }

    /// Inbound buffers shorter than a command header, released unprocessed.
    pub fn header_errors(&self) -> u32 {
        self.header_errors
    }

    fn drain_outbound(&mut self) {
        for ep in 0..self.outbound_endpoints {
            let ep = unwrap!(EpId::new(ep));
            let Some(ctx) = self
                .pool
                .claim(ContextState::EpPending(ep), ContextState::EpBusy(ep))
            else {
                continue;
            };
            if let Err(ctx) = self.usb.submit(ep, ctx) {
                // Endpoint busy: requeue, retried next iteration
                self.pool.set_state(ctx, ContextState::EpPending(ep));
            }
        }
    }

    fn intake_inbound(&mut self) {
        let Some(mut ctx) = self
            .pool
            .claim(ContextState::RecvDone, ContextState::MainProcessing)
        else {
            return;
        };

        let Some((header, _)) = CommandHeader::parse(ctx.data()) else {
            self.header_errors += 1;
            warn!("inbound buffer too short for a header, {} bytes", ctx.len());
            self.pool.release(ctx);
            return;
        };

        match self.dispatch.dispatch(header, &mut ctx) {
            Disposition::Reply(ep) => self.pool.set_state(ctx, ContextState::EpPending(ep)),
            Disposition::Done => self.pool.release(ctx),
        }
    }

    fn relieve_backpressure(&mut self) {
        for throttle in self.throttles {
            throttle.resume();
        }
    }
}
